use std::time::Duration;

pub const MAX_GUEST_NAME_LEN: usize = 200;
pub const MAX_PHONE_LEN: usize = 40;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_RESPONSIBLE_LEN: usize = 120;
pub const MAX_ROOM_TYPE_LEN: usize = 64;

/// Longest stay accepted at creation/edit time, in nights.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Upper bound on the cached working set.
pub const MAX_RESERVATIONS: usize = 100_000;

/// Pause before the single delete retry.
pub const DELETE_RETRY_DELAY: Duration = Duration::from_millis(250);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
