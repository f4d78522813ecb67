use bi_core::TabId;
use log::debug;

use crate::command::{Payload, Response};
use crate::service::Background;

impl Background {
    /// Which domain the interstitial in `tab` is standing in for.
    ///
    /// Tracker marker first, then the page-supplied fallback. When neither
    /// is available the answer is `{success: false, domain: null}`.
    pub async fn get_blocked_domain(&self, tab: Option<TabId>, fallback: Option<String>) -> Response {
        let fallback = fallback.filter(|d| !d.is_empty());

        let tracked = match tab {
            Some(tab) => self.pending().get(tab).await,
            None => Ok(None),
        };

        match tracked {
            Ok(Some(domain)) => Response::ok(Payload::Domain { domain: Some(domain) }),
            Ok(None) => match fallback {
                Some(domain) => Response::ok(Payload::Domain { domain: Some(domain) }),
                None => Response {
                    success: false,
                    error: None,
                    payload: Payload::Domain { domain: None },
                },
            },
            Err(e) => {
                debug!("pending block lookup failed: {e}");
                Response {
                    success: false,
                    error: Some(e.to_string()),
                    payload: Payload::Domain { domain: fallback },
                }
            }
        }
    }
}
