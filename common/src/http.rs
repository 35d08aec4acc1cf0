use crate::config::HttpConfig;
use crate::errors::*;
pub use reqwest::{Client, StatusCode};
use std::time::Duration;

pub fn client(config: &HttpConfig) -> Result<Client> {
    let timeout = Duration::from_secs(config.timeout());
    Client::builder()
        .user_agent(config.user_agent())
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(Error::from)
}
