//! Single-resolution promise exposed to scripts.
//!
//! Scripts run synchronously, so reactions fire as soon as their promise
//! settles. A promise settled with another promise adopts its outcome.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rhai::{Dynamic, EvalAltResult, FnPtr, NativeCallContext};

use super::convert::script_error;

type Outcome = Result<Dynamic, Dynamic>;

enum PromiseState {
    Pending(Vec<Reaction>),
    Settled(Outcome),
}

struct Reaction {
    on_fulfilled: Option<FnPtr>,
    on_rejected: Option<FnPtr>,
    next: ScriptPromise,
}

/// Promise handle; clones share state.
#[derive(Clone)]
pub(crate) struct ScriptPromise {
    state: Arc<Mutex<PromiseState>>,
}

impl ScriptPromise {
    pub(crate) fn pending() -> Self {
        Self {
            state: Arc::new(Mutex::new(PromiseState::Pending(Vec::new()))),
        }
    }

    pub(crate) fn fulfilled(value: Dynamic) -> Self {
        Self::with_outcome(Ok(value))
    }

    pub(crate) fn rejected(reason: Dynamic) -> Self {
        Self::with_outcome(Err(reason))
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(PromiseState::Settled(outcome))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PromiseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The settled outcome, or `None` while pending.
    pub(crate) fn outcome(&self) -> Option<Outcome> {
        match &*self.lock() {
            PromiseState::Pending(_) => None,
            PromiseState::Settled(outcome) => Some(outcome.clone()),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.outcome().is_some()
    }

    /// Settles the promise; later calls on a settled promise are ignored.
    pub(crate) fn settle(
        &self,
        ctx: &NativeCallContext,
        outcome: Outcome,
    ) -> Result<(), Box<EvalAltResult>> {
        if let Ok(value) = &outcome
            && let Some(inner) = value.clone().try_cast::<ScriptPromise>()
        {
            if Arc::ptr_eq(&inner.state, &self.state) {
                return Err(script_error("a promise cannot be resolved with itself"));
            }
            return inner.subscribe(
                ctx,
                Reaction {
                    on_fulfilled: None,
                    on_rejected: None,
                    next: self.clone(),
                },
            );
        }

        let reactions = {
            let mut state = self.lock();
            if matches!(*state, PromiseState::Settled(_)) {
                return Ok(());
            }
            match mem::replace(&mut *state, PromiseState::Settled(outcome.clone())) {
                PromiseState::Pending(reactions) => reactions,
                PromiseState::Settled(_) => Vec::new(),
            }
        };
        for reaction in reactions {
            reaction.run(ctx, &outcome)?;
        }
        Ok(())
    }

    /// Registers handlers and returns the promise for their result.
    pub(crate) fn then(
        &self,
        ctx: &NativeCallContext,
        on_fulfilled: Option<FnPtr>,
        on_rejected: Option<FnPtr>,
    ) -> Result<ScriptPromise, Box<EvalAltResult>> {
        let next = ScriptPromise::pending();
        self.subscribe(
            ctx,
            Reaction {
                on_fulfilled,
                on_rejected,
                next: next.clone(),
            },
        )?;
        Ok(next)
    }

    fn subscribe(
        &self,
        ctx: &NativeCallContext,
        reaction: Reaction,
    ) -> Result<(), Box<EvalAltResult>> {
        let settled = {
            let mut state = self.lock();
            match &mut *state {
                PromiseState::Pending(reactions) => {
                    reactions.push(reaction);
                    return Ok(());
                }
                PromiseState::Settled(outcome) => outcome.clone(),
            }
        };
        reaction.run(ctx, &settled)
    }
}

impl Reaction {
    fn run(self, ctx: &NativeCallContext, outcome: &Outcome) -> Result<(), Box<EvalAltResult>> {
        let handler = match outcome {
            Ok(_) => self.on_fulfilled.as_ref(),
            Err(_) => self.on_rejected.as_ref(),
        };
        let Some(handler) = handler else {
            return self.next.settle(ctx, outcome.clone());
        };
        let argument = match outcome {
            Ok(value) | Err(value) => value.clone(),
        };
        match handler.call_within_context::<Dynamic>(ctx, (argument,)) {
            Ok(result) => self.next.settle(ctx, Ok(result)),
            Err(error) => match into_thrown(error) {
                Ok(thrown) => self.next.settle(ctx, Err(thrown)),
                Err(fatal) => Err(fatal),
            },
        }
    }
}

/// Extracts the value a handler threw; engine failures (limits, termination)
/// are passed through so they still abort the script.
fn into_thrown(error: Box<EvalAltResult>) -> Result<Dynamic, Box<EvalAltResult>> {
    match *error {
        EvalAltResult::ErrorRuntime(value, _) => Ok(value),
        EvalAltResult::ErrorInFunctionCall(.., inner, _) => into_thrown(inner),
        other => Err(Box::new(other)),
    }
}
