//! The values chain links hand back to the dispatcher.
//!
//! Every middleware and handler resolves to a [`Flow`]. Halting is a variant of that type rather
//! than an error, so the dispatcher tells a deliberate short-circuit from a fault by matching on
//! it instead of inspecting error types.

use crate::body::ResponseBody;
use crate::error::BoxError;
use crate::responder::Responder;
use crate::Context;
use http::Response;
use std::error::Error;

/// The outcome of running a chain link.
#[derive(Debug)]
pub enum Flow {
    /// No value was produced, the response in progress on the [`Context`] stands.
    Continue,
    /// A response returned directly by a link.
    Respond(Response<ResponseBody>),
    /// The request was halted through [`Context::halt`].
    Halted(Halted),
    /// The link failed.
    Fault(BoxError),
}

/// Proof that [`Context::halt`] was called.
///
/// The halt status and body live on the context; only the context can create this token.
#[derive(Debug)]
pub struct Halted(());

impl Halted {
    pub(crate) fn new() -> Self {
        Self(())
    }
}

/// The error side of a handler function's result.
///
/// Any [`std::error::Error`] converts into [`Signal::Fault`], so handlers can use `?`.
#[derive(Debug)]
pub enum Signal {
    Halted(Halted),
    Fault(BoxError),
}

impl Signal {
    pub fn fault<E: Into<BoxError>>(error: E) -> Self {
        Self::Fault(error.into())
    }
}

impl<E> From<E> for Signal
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::Fault(Box::new(error))
    }
}

impl From<Halted> for Signal {
    fn from(halted: Halted) -> Self {
        Self::Halted(halted)
    }
}

impl From<Halted> for Flow {
    fn from(halted: Halted) -> Self {
        Flow::Halted(halted)
    }
}

impl From<Signal> for Flow {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Halted(halted) => Flow::Halted(halted),
            Signal::Fault(error) => Flow::Fault(error),
        }
    }
}

/// Values a handler function may return.
pub trait IntoFlow {
    fn into_flow(self, ctx: &Context) -> Flow;
}

impl IntoFlow for () {
    fn into_flow(self, _ctx: &Context) -> Flow {
        Flow::Continue
    }
}

impl IntoFlow for Flow {
    fn into_flow(self, _ctx: &Context) -> Flow {
        self
    }
}

impl<T: Responder> IntoFlow for T {
    fn into_flow(self, ctx: &Context) -> Flow {
        Flow::Respond(self.response_to(ctx))
    }
}

#[cfg(test)]
mod tests {
    use crate::flow::{Flow, Halted, Signal};
    use std::io;

    #[test]
    fn test_error_converts_to_fault() {
        fn fails() -> Result<(), Signal> {
            Err(io::Error::other("disk gone"))?;
            Ok(())
        }

        let signal = fails().unwrap_err();
        assert!(matches!(&signal, Signal::Fault(e) if e.to_string() == "disk gone"));
        assert!(matches!(Flow::from(signal), Flow::Fault(_)));
    }

    #[test]
    fn test_halted_converts() {
        assert!(matches!(Signal::from(Halted::new()), Signal::Halted(_)));
        assert!(matches!(Flow::from(Signal::from(Halted::new())), Flow::Halted(_)));
        assert!(matches!(Flow::from(Halted::new()), Flow::Halted(_)));
    }
}
