mod github;
mod napcat;

pub use github::GitHubClient;
pub use napcat::NapCatClient;
