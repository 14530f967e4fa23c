//! Custom CSS byte budget.
//!
//! AMP caps the `<style amp-custom>` block at a fixed byte size. Every pass that
//! synthesizes CSS draws from the same counter owned by the document.

/// Maximum size of the `<style amp-custom>` block.
pub const MAX_CUSTOM_CSS_BYTES: usize = 75_000;

/// Running counter of custom CSS bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CssByteBudget {
    limit: usize,
    used: usize,
}

impl CssByteBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Budget with `used` bytes already taken, saturating at the limit.
    pub fn with_used(limit: usize, used: usize) -> Self {
        Self {
            limit,
            used: used.min(limit),
        }
    }

    /// Reserve `bytes`. Nothing is reserved when the request does not fit.
    pub fn allocate(&mut self, bytes: usize) -> bool {
        if bytes > self.remaining() {
            return false;
        }
        self.used += bytes;
        true
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for CssByteBudget {
    fn default() -> Self {
        Self::new(MAX_CUSTOM_CSS_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_allocate_within_limit() {
        let mut budget = CssByteBudget::new(10);
        assert!(budget.allocate(4));
        assert!(budget.allocate(6));
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.used(), 10);
    }

    #[test]
    fn test_allocate_over_limit_reserves_nothing() {
        let mut budget = CssByteBudget::new(10);
        assert!(budget.allocate(8));
        assert!(!budget.allocate(3));
        assert_eq!(budget.used(), 8);
        assert!(budget.allocate(2));
    }

    #[test]
    fn test_with_used_saturates() {
        let budget = CssByteBudget::with_used(10, 25);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(CssByteBudget::default().limit(), MAX_CUSTOM_CSS_BYTES);
    }
}
