//! The `Metric` capability: the one thing a caller must supply to index arbitrary
//! records in a cover tree.
//!
//! This generalizes the `DistanceMetric`-style marker traits the other tree modules in
//! this crate use for fixed point types (`Point2D`, `Point3D`) to an arbitrary record
//! type `R`. The core never inspects `R`'s fields; every spatial decision is made by
//! calling `Metric::distance`.

/// A distance function over records of type `R`.
///
/// Implementations must behave as a metric: non-negative, zero exactly for identical
/// points, symmetric, and triangle-inequality-respecting. The cover tree assumes these
/// properties hold and does not validate them; a metric that violates them silently
/// breaks the tree's pruning and query correctness.
///
/// A `Metric` must be safe to call concurrently from any number of reader threads, and
/// must never attempt to acquire the tree's own lock (the tree may already be holding it
/// while calling in).
pub trait Metric<R>: Send + Sync {
    /// Returns the distance between `a` and `b`.
    fn distance(&self, a: &R, b: &R) -> f64;
}

/// Blanket impl so a bare closure or function pointer can be used as a `Metric`
/// without a wrapper type, mirroring how this crate lets callers pass plain distance
/// functions to its other spatial structures.
impl<R, F> Metric<R> for F
where
    F: Fn(&R, &R) -> f64 + Send + Sync,
{
    fn distance(&self, a: &R, b: &R) -> f64 {
        self(a, b)
    }
}
