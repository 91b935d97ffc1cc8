//! Federated sign-in: the server's device code flow stands in for the
//! provider pop-up. The user finishes consent in a browser while we poll.

use std::sync::Arc;
use std::time::Duration;

use hub_core::IdentityError;
use serde_json::json;
use shared::{
    AuthResponse, DeviceCodeRequest, DeviceCodeResponse, DevicePollResponse, FederatedProvider,
};

use crate::api::ApiClient;

/// Shown the device code once the server issued it
pub type DevicePrompt = Arc<dyn Fn(&DeviceCodeResponse) + Send + Sync>;

#[derive(Clone)]
pub struct DeviceLogin {
    pub poll_interval: Duration,
    pub prompt: DevicePrompt,
}

impl Default for DeviceLogin {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            prompt: Arc::new(print_prompt),
        }
    }
}

pub fn print_prompt(device_code: &DeviceCodeResponse) {
    println!();
    println!("\x1b[1;36m🔐 To sign in, open this URL in your browser:\x1b[0m");
    println!();
    println!("   \x1b[4m{}\x1b[0m", device_code.url);
    println!();
    println!(
        "\x1b[90mWaiting for sign-in... (expires in {} seconds)\x1b[0m",
        device_code.expires_in
    );
}

impl DeviceLogin {
    /// Run the flow to completion. An expired code, or no answer before
    /// it expires, counts as the user closing the pop-up.
    pub async fn run(
        &self,
        api: &ApiClient,
        provider: FederatedProvider,
    ) -> Result<AuthResponse, IdentityError> {
        let device_code: DeviceCodeResponse = api
            .post("/auth/device-code", &DeviceCodeRequest { provider })
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        (self.prompt)(&device_code);

        let interval_ms = self.poll_interval.as_millis().max(1) as u64;
        let max_attempts = (device_code.expires_in * 1000 / interval_ms).max(1);

        for attempt in 0..max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let poll = api
                .post::<_, DevicePollResponse>(
                    "/auth/device-poll",
                    &json!({ "code": device_code.code }),
                )
                .await;

            match poll {
                Ok(DevicePollResponse::Success { token, session }) => {
                    tracing::info!("{} sign-in completed", provider);
                    return Ok(AuthResponse { token, session });
                }
                Ok(DevicePollResponse::Pending) => continue,
                Ok(DevicePollResponse::Expired) => return Err(IdentityError::PopupClosed),
                Err(e) => {
                    // Keep polling through transient failures
                    if attempt % 5 == 0 {
                        tracing::warn!("Poll failed (retrying...): {}", e);
                    }
                }
            }
        }

        Err(IdentityError::PopupClosed)
    }
}
