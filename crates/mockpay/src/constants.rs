use std::time::Duration;

/// Webhook payload schema version.
pub const PAYLOAD_VERSION: &str = "v2";

/// Prefix prepended to a transaction id to form its payment id.
pub const PAYMENT_ID_PREFIX: &str = "pay_";

/// Event type sent with a completed payment.
pub const EVENT_PAYMENT_COMPLETED: &str = "payment.completed";

/// Header carrying the event type.
pub const HEADER_EVENT: &str = "X-Payment-Event";

/// Header carrying the base64 HMAC-SHA256 of the request body.
pub const HEADER_SIGNATURE: &str = "X-Payment-Signature";

/// Retries after the first attempt (4 attempts in total).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay; attempt `n` waits `DEFAULT_RETRY_DELAY * 2^n`.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulated processing time before a new payment auto-completes.
pub const DEFAULT_SETTLEMENT_DELAY: Duration = Duration::from_secs(2);
