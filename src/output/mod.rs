mod report;
mod styling;

pub use report::print_run_result;
use styling::{label, title};

/// Prints the release-herald banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("📣 release-herald"),
        label(env!("CARGO_PKG_VERSION")),
        label("Release notes for every deployment")
    );
}
