//! Maps `Box<dyn Error>` from trait boundaries to typed `CarouselError`.
//!
//! The traits in `carousel_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to our typed error enum,
//! with an optional feature-gated path for `carousel_hardware::HwError`
//! downcasting.

use crate::error::CarouselError;

/// Map a trait-boundary error to a typed `CarouselError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CarouselError {
    // Feature-gated: try to downcast to HwError for precise mapping
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<carousel_hardware::error::HwError>() {
            return match hw {
                carousel_hardware::error::HwError::Timeout => CarouselError::Timeout,
                other => CarouselError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CarouselError::Timeout
    } else {
        CarouselError::Hardware(s)
    }
}

/// Convenience for `map_err` on a boxed trait error.
pub(crate) fn from_boxed(e: Box<dyn std::error::Error + Send + Sync>) -> CarouselError {
    map_hw_error(&*e)
}
