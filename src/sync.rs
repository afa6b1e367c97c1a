pub use std::sync::atomic;
pub use std::sync::Arc;

/// A mutex.
///
/// The simulation itself is single-threaded (see the scheduling model in
/// `sim`): locks exist so port and stats handles can be shared between
/// simulation objects, and are never contended.
#[cfg(feature = "parking_lot")]
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct Mutex<T: ?Sized>(parking_lot::Mutex<T>);

#[cfg(feature = "parking_lot")]
impl<T> Mutex<T> {
    #[must_use]
    #[inline]
    pub fn new(value: T) -> Self {
        Self(parking_lot::Mutex::new(value))
    }
}

#[cfg(feature = "parking_lot")]
impl<T: ?Sized> Mutex<T> {
    #[must_use]
    #[inline]
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, T> {
        self.0.lock()
    }
}

/// A mutex.
///
/// The simulation itself is single-threaded (see the scheduling model in
/// `sim`): locks exist so port and stats handles can be shared between
/// simulation objects, and are never contended.
#[cfg(not(feature = "parking_lot"))]
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct Mutex<T: ?Sized>(std::sync::Mutex<T>);

#[cfg(not(feature = "parking_lot"))]
impl<T> Mutex<T> {
    #[must_use]
    #[inline]
    pub fn new(value: T) -> Self {
        Self(std::sync::Mutex::new(value))
    }
}

#[cfg(not(feature = "parking_lot"))]
impl<T: ?Sized> Mutex<T> {
    #[must_use]
    #[inline]
    pub fn lock(&self) -> std::sync::MutexGuard<'_, T> {
        self.0.lock().expect("lock poisoned")
    }
}
