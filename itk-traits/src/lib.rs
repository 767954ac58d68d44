use std::fmt::Debug;

// Usable at the end of any fallible chain where the failure should be logged and then dropped.
pub trait ForwardRefToTracing<T, E> {
    fn trace_err(self) -> Result<T, E>;
    fn trace_err_ok(self) -> Option<T>;
    /// Same as `trace_err_ok`, but for failures that are expected every now and then,
    /// like deleting a message someone already deleted.
    fn trace_warn_ok(self) -> Option<T>;
}

impl<T, E> ForwardRefToTracing<T, E> for Result<T, E>
where
    E: Debug,
{
    fn trace_err(self) -> Result<T, E> {
        self.map_err(|e| {
            tracing::error!("{:?}", e);
            e
        })
    }

    fn trace_err_ok(self) -> Option<T> {
        self.trace_err().ok()
    }

    fn trace_warn_ok(self) -> Option<T> {
        self.map_err(|e| {
            tracing::warn!("{:?}", e);
            e
        })
        .ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn passes_values_through() {
        let ok: Result<u8, &str> = Ok(3);
        assert_eq!(ok.trace_err_ok(), Some(3));
        assert_eq!(ok.trace_warn_ok(), Some(3));
        assert_eq!(ok.trace_err(), Ok(3));
    }

    #[test]
    fn drops_errors() {
        let err: Result<u8, &str> = Err("gone");
        assert_eq!(err.trace_err_ok(), None);
        assert_eq!(err.trace_warn_ok(), None);
        assert_eq!(err.trace_err(), Err("gone"));
    }
}
