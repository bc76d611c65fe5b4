//! Periodic keepalive pings.
//!
//! Free hosting tiers put the exercise server to sleep after a few minutes
//! of silence, which would make the next generation request time out in
//! the middle of an exam. While the app is open we ping the keepalive
//! endpoint on an interval; failures are logged and the loop keeps going.

use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Keepalive {
    handle: Option<JoinHandle<()>>,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self::new()
    }
}

impl Keepalive {
    pub fn new() -> Self {
        Self { handle: None }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start pinging `base_url`. Calling this while a loop is already
    /// running is a no-op.
    pub fn start(&mut self, http: reqwest::Client, base_url: String) {
        if self.is_running() {
            return;
        }
        self.handle = Some(tokio::spawn(async move {
            let url = format!("{}/health/keepalive", base_url.trim_end_matches('/'));
            let mut interval = tokio::time::interval(KEEPALIVE_INTERVAL);
            interval.tick().await; // the first tick resolves immediately
            loop {
                interval.tick().await;
                match http.get(&url).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!("Keepalive ping ok");
                    }
                    Ok(response) => {
                        warn!("Keepalive ping returned {}", response.status());
                    }
                    Err(err) => {
                        warn!("Keepalive ping failed: {err}");
                    }
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.stop();
    }
}
