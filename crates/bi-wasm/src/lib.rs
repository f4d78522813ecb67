//! WebAssembly bindings for BlockIt
//!
//! The service worker calls `init_background` once and then forwards each
//! extension event (messages, navigations, lifecycle) to the exports here.
//! The blocked page uses the pure helpers at the bottom.

mod chrome;
mod convert;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use bi_background::{Background, Command, Config, Host, NavigationEvent, ReleaseFeed, Request};
use bi_core::{InterstitialView, Version};
use js_sys::Reflect;
use log::{error, info, warn, Level, LevelFilter};
use wasm_bindgen::prelude::*;

use chrome::{ChromeRules, ChromeStorage, ChromeTabs, FetchFeed, JsClock};

thread_local! {
    static BACKGROUND: RefCell<Option<Rc<Background>>> = const { RefCell::new(None) };
}

static LOGGER: Once = Once::new();

/// Install the console logger once; later calls only change the level.
fn init_logging(level: &str) {
    LOGGER.call_once(|| wasm_logger::init(wasm_logger::Config::new(Level::Trace)));
    log::set_max_level(level.parse().unwrap_or(LevelFilter::Info));
}

fn background() -> Result<Rc<Background>, JsValue> {
    BACKGROUND
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| JsValue::from_str("Background not initialized. Call init_background first."))
}

/// Build the service against the extension APIs.
///
/// `config` is a plain object with the camelCase `Config` fields; missing
/// fields keep their defaults. `log_level` is one of the `log` level names.
#[wasm_bindgen]
pub fn init_background(config: JsValue, log_level: Option<String>) -> Result<(), JsValue> {
    init_logging(log_level.as_deref().unwrap_or("info"));

    let config: Config = match convert::to_json(&config)? {
        serde_json::Value::Null => Config::default(),
        value => serde_json::from_value(value)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {e}")))?,
    };

    let feed = config
        .release_feed_url
        .as_deref()
        .map(|url| Rc::new(FetchFeed::new(url)) as Rc<dyn ReleaseFeed>);

    let host = Host {
        local: Rc::new(ChromeStorage::local()?),
        session: Rc::new(ChromeStorage::session()?),
        rules: Rc::new(ChromeRules::new()?),
        tabs: Rc::new(ChromeTabs::new()?),
        clock: Rc::new(JsClock),
        feed,
    };

    info!("background initialised (v{})", config.current_version);
    let service = Rc::new(Background::new(host, config));
    BACKGROUND.with(|slot| *slot.borrow_mut() = Some(service));
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    BACKGROUND.with(|slot| slot.borrow().is_some())
}

/// Answer a runtime message. Always resolves to a `{success, ...}` object.
#[wasm_bindgen]
pub async fn handle_message(message: JsValue, sender_tab: Option<i32>) -> Result<JsValue, JsValue> {
    let service = background()?;
    let message = convert::to_json(&message)?;

    let response = match serde_json::from_value::<Command>(message) {
        Ok(command) => {
            let request = Request { command, sender_tab };
            service.dispatch(request).await.to_json()
        }
        Err(e) => {
            warn!("rejected message: {e}");
            serde_json::json!({ "success": false, "error": format!("Invalid message: {e}") })
        }
    };
    convert::from_json(&response)
}

#[wasm_bindgen]
pub async fn on_installed() -> Result<(), JsValue> {
    let service = background()?;
    service
        .on_installed()
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub async fn on_startup() -> Result<(), JsValue> {
    let service = background()?;
    service
        .on_startup()
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// `webNavigation.onBeforeNavigate` listener; never rejects.
#[wasm_bindgen]
pub async fn on_before_navigate(tab_id: i32, frame_id: i32, url: String) {
    let Ok(service) = background() else {
        return;
    };
    let event = NavigationEvent {
        tab_id,
        frame_id: i64::from(frame_id),
        url,
    };
    service.on_before_navigate(&event).await;
}

#[wasm_bindgen]
pub async fn on_tab_removed(tab_id: i32) {
    if let Ok(service) = background() {
        service.on_tab_removed(tab_id).await;
    }
}

/// Run one break-time sweep. Resolves to the list of expired domains.
#[wasm_bindgen]
pub async fn sweep() -> Result<JsValue, JsValue> {
    let service = background()?;
    let report = service
        .sweep_break_times()
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(report
        .expired
        .iter()
        .map(|domain| JsValue::from_str(domain))
        .collect::<js_sys::Array>()
        .into())
}

/// Start the periodic sweep on the configured interval.
#[wasm_bindgen]
pub fn start_sweep() -> Result<(), JsValue> {
    let interval = background()?.config().sweep_interval();
    let tick = Closure::<dyn FnMut()>::new(|| {
        wasm_bindgen_futures::spawn_local(async {
            if let Err(e) = sweep().await {
                error!("break sweep failed: {}", convert::error_text(&e));
            }
        });
    });
    chrome::set_interval(
        tick.as_ref(),
        i32::try_from(interval.as_millis()).unwrap_or(i32::MAX),
    );
    // Lives as long as the worker.
    tick.forget();
    Ok(())
}

// =============================================================================
// Blocked page helpers
// =============================================================================

/// Resolve the blocked domain: tracker answer, then `?site=`, then referrer.
/// Returns `{domain, source}` or `null`.
#[wasm_bindgen]
pub fn resolve_blocked_domain(tracked: Option<String>, page_url: &str, referrer: Option<String>) -> JsValue {
    let Some(resolved) = bi_core::resolve_blocked_domain(tracked.as_deref(), page_url, referrer.as_deref()) else {
        return JsValue::NULL;
    };

    let source = match resolved.source {
        bi_core::DomainSource::Tracker => "tracker",
        bi_core::DomainSource::UrlParameter => "urlParameter",
        bi_core::DomainSource::Referrer => "referrer",
    };
    let result = js_sys::Object::new();
    let _ = Reflect::set(&result, &"domain".into(), &JsValue::from_str(&resolved.domain));
    let _ = Reflect::set(&result, &"source".into(), &JsValue::from_str(source));
    result.into()
}

/// The URL-and-referrer part of resolution, sent as the `getBlockedDomain`
/// fallback.
#[wasm_bindgen]
pub fn blocked_domain_fallback(page_url: &str, referrer: Option<String>) -> Option<String> {
    bi_core::resolve::url_fallback(page_url, referrer.as_deref())
}

#[wasm_bindgen]
pub fn interstitial_view(domain: Option<String>, seed: u32) -> JsValue {
    let view = InterstitialView::new(domain.as_deref(), seed);

    let result = js_sys::Object::new();
    let domain = view.domain.as_deref().map_or(JsValue::NULL, JsValue::from_str);
    let _ = Reflect::set(&result, &"domain".into(), &domain);
    let _ = Reflect::set(&result, &"displayName".into(), &JsValue::from_str(&view.display_name));
    let _ = Reflect::set(&result, &"title".into(), &JsValue::from_str(&view.title));
    let _ = Reflect::set(&result, &"quote".into(), &JsValue::from_str(view.quote));
    let _ = Reflect::set(&result, &"actionsEnabled".into(), &JsValue::from(view.actions_enabled));

    let minutes = js_sys::Array::new();
    for &m in view.break_minutes {
        minutes.push(&JsValue::from(m));
    }
    let _ = Reflect::set(&result, &"breakMinutes".into(), &minutes);
    result.into()
}

/// Normalise user input into a bare domain, or throw "Invalid domain: ...".
#[wasm_bindgen]
pub fn normalize_domain(input: &str) -> Result<String, JsValue> {
    bi_core::normalize_domain(input).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// -1, 0 or 1 as `a` is older than, equal to or newer than `b`.
#[wasm_bindgen]
pub fn compare_versions(a: &str, b: &str) -> i32 {
    match Version::parse(a).cmp(&Version::parse(b)) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("v1.2.0", "1.2"), 0);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), 1);
        assert_eq!(compare_versions("0.9", "v1"), -1);
    }

    #[wasm_bindgen_test]
    fn test_blocked_domain_fallback() {
        let page = "chrome-extension://abc/blocked.html?site=www.reddit.com";
        assert_eq!(blocked_domain_fallback(page, None).as_deref(), Some("reddit.com"));
        assert_eq!(
            blocked_domain_fallback("chrome-extension://abc/blocked.html", Some("https://x.com/a".into())).as_deref(),
            Some("x.com")
        );
    }

    #[wasm_bindgen_test]
    fn test_log_level_follows_latest_init() {
        init_logging("debug");
        assert_eq!(log::max_level(), LevelFilter::Debug);
        init_logging("warn");
        assert_eq!(log::max_level(), LevelFilter::Warn);
        init_logging("nonsense");
        assert_eq!(log::max_level(), LevelFilter::Info);
    }

    #[wasm_bindgen_test]
    fn test_not_initialized() {
        assert!(!is_initialized());
    }
}
