//! Quota enforcement glue for handlers.
//!
//! Handlers call [`charge`] before doing work; the returned decision is
//! applied to the response as the `X-Burst-*` / `X-Weekly-*` /
//! `X-Extra-Usage-*` header families, with soft-limit downgrades
//! reported via `X-Soft-Limited` and `X-Degraded`.

use crate::errors::ApiError;
use crate::state::AppState;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use webpeel_quota::{QuotaDecision, QuotaOutcome, UsageClass};
use webpeel_types::{PeelError, PeelOptions};

/// Check and consume quota. Hard blocks become errors; everything else
/// is returned for header reporting and soft-limit handling.
pub async fn charge(
    state: &AppState,
    api_key_id: &str,
    class: UsageClass,
    request_id: &str,
) -> Result<QuotaDecision, ApiError> {
    let decision = state
        .quota
        .check_and_consume(api_key_id, class)
        .await
        .map_err(|e| ApiError::internal(e, request_id))?;

    if let QuotaOutcome::HardBlocked { retry_after_secs } = decision.outcome {
        return Err(ApiError::new(
            PeelError::BurstLimitExceeded {
                retry_after_secs,
            },
            request_id,
        ));
    }
    Ok(decision)
}

/// Degrade options under a soft limit: no rendering, no settle waits.
/// Returns a description for the `X-Degraded` header when applied.
pub fn apply_soft_limit(options: &mut PeelOptions, decision: &QuotaDecision) -> Option<String> {
    if !decision.is_soft_limited() {
        return None;
    }
    let mut degraded = Vec::new();
    if options.render || options.stealth {
        options.render = false;
        options.stealth = false;
        degraded.push("render disabled");
    }
    if options.wait.is_some() {
        options.wait = None;
        degraded.push("wait disabled");
    }
    Some(if degraded.is_empty() {
        "weekly quota exhausted".to_string()
    } else {
        degraded.join(", ")
    })
}

fn put(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Write the quota header families onto a response.
pub fn apply_quota_headers(
    headers: &mut HeaderMap,
    decision: &QuotaDecision,
    degraded: Option<&str>,
) {
    put(headers, "x-burst-limit", decision.burst.limit.to_string());
    put(headers, "x-burst-used", decision.burst.used.to_string());
    put(
        headers,
        "x-burst-remaining",
        decision.burst.remaining.to_string(),
    );

    put(headers, "x-weekly-limit", decision.weekly.limit.to_string());
    put(headers, "x-weekly-used", decision.weekly.used.to_string());
    put(
        headers,
        "x-weekly-remaining",
        decision.weekly.remaining.to_string(),
    );
    put(
        headers,
        "x-weekly-percent",
        format!("{:.1}", decision.weekly.percent_used),
    );
    put(
        headers,
        "x-weekly-resets-at",
        decision.weekly.resets_at.to_rfc3339(),
    );

    put(
        headers,
        "x-extra-usage-enabled",
        decision.extra.enabled.to_string(),
    );
    put(
        headers,
        "x-extra-usage-balance",
        format!("{:.3}", decision.extra.balance),
    );
    put(
        headers,
        "x-extra-usage-spent",
        format!("{:.3}", decision.extra.spent),
    );
    put(
        headers,
        "x-extra-usage-limit",
        format!("{:.3}", decision.extra.spending_limit),
    );

    if let Some(reason) = degraded {
        put(headers, "x-soft-limited", "true".to_string());
        put(headers, "x-degraded", reason.to_string());
    }
}
