//! Internal registration handles.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use muajjal_container::key::RegistrationKey;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Mints process-unique [`RegistrationKey`]s for real registrations.
pub struct NameGenerator;

impl NameGenerator {
    /// A key no other registration in this process has.
    pub fn next_key() -> RegistrationKey {
        let raw = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        RegistrationKey::from_raw(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}
