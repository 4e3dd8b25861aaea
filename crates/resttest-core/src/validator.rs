//! The validator capability interface.
//!
//! Validators are an external collaborator: the engine only needs to call
//! `validate(response, context) -> bool` on each one, in order, short-circuiting on the
//! first failure. Their internals (body extraction, JSONPath, templated comparisons) are
//! out of scope for this crate.

/// A read-only view of a drained HTTP response, as seen by a validator.
#[derive(Debug, Clone)]
pub struct ResponseView<'a> {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, insertion order preserved.
    pub headers: &'a [(String, String)],
    /// Fully-drained response body.
    pub body: &'a [u8],
}

impl<'a> From<&'a crate::client::HttpResponse> for ResponseView<'a> {
    fn from(response: &'a crate::client::HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: &response.headers,
            body: &response.body,
        }
    }
}

/// A capability object evaluating a response for correctness.
///
/// Implementations are expected to be deterministic with respect to a given response:
/// the executor never retries on a validator returning `false` or erroring, only on
/// transport failures and retryable status codes (see [`crate::retry::RetryPolicy`]).
#[cfg_attr(test, mockall::automock)]
pub trait Validator<C: 'static>: Send + Sync {
    /// A short, stable identifier used in `AttemptRecord.error` when this validator
    /// is the one that causes a failed record (useful once more than one validator
    /// is configured on a test).
    fn name(&self) -> &str;

    /// Evaluate `response` against `context`. Returning `false` fails the attempt;
    /// it does not trigger a retry.
    fn validate(&self, response: &ResponseView<'_>, context: &mut C) -> bool;
}

/// A validator built from a closure, for tests and simple inline checks.
pub struct FnValidator<C> {
    name: String,
    f: Box<dyn Fn(&ResponseView<'_>, &mut C) -> bool + Send + Sync>,
}

impl<C> FnValidator<C> {
    /// Wrap `f` as a named [`Validator`].
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&ResponseView<'_>, &mut C) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl<C: 'static> Validator<C> for FnValidator<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, response: &ResponseView<'_>, context: &mut C) -> bool {
        (self.f)(response, context)
    }
}
