//! Engine construction: limits, disabled features and the script API surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, FnPtr, INT, Map as ScriptMap, NativeCallContext};

use super::SandboxLimits;
use super::http_api::{ScriptHttp, ScriptResponse};
use super::logger::{ScriptLogLevel, ScriptLogger};
use super::promise::ScriptPromise;
use super::share_api::ScriptShare;

/// Termination token returned from the progress callback when the deadline passes.
pub(crate) const TERMINATED_BY_DEADLINE: INT = 1;
/// Termination token returned when the caller cancelled the invocation.
pub(crate) const TERMINATED_BY_CALLER: INT = 2;

/// How often, in operations, the progress callback checks the clock.
const PROGRESS_CHECK_INTERVAL: u64 = 256;

/// Engine with limits applied and no host access. Used for compilation.
pub(crate) fn restricted_engine(limits: &SandboxLimits) -> Engine {
    let mut engine = Engine::new();
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_collection_size);
    engine.set_max_map_size(limits.max_collection_size);
    engine.on_print(|_| {});
    engine.on_debug(|_, _, _| {});
    engine
}

/// Engine for one invocation: restricted, deadline-bound, with the script API
/// registered and `print`/`debug` routed to `logger`.
pub(crate) fn invocation_engine(
    limits: &SandboxLimits,
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
    logger: &ScriptLogger,
) -> Engine {
    let mut engine = restricted_engine(limits);

    engine.on_progress(move |operations| {
        if operations % PROGRESS_CHECK_INTERVAL != 0 {
            return None;
        }
        if cancelled.load(Ordering::Relaxed) {
            return Some(Dynamic::from(TERMINATED_BY_CALLER));
        }
        if Instant::now() >= deadline {
            return Some(Dynamic::from(TERMINATED_BY_DEADLINE));
        }
        None
    });

    let print_logger = logger.clone();
    engine.on_print(move |text| print_logger.log(ScriptLogLevel::Info, text));
    let debug_logger = logger.clone();
    engine.on_debug(move |text, _, _| debug_logger.log(ScriptLogLevel::Debug, text));

    register_share_api(&mut engine);
    register_http_api(&mut engine);
    register_logger_api(&mut engine);
    register_promise_api(&mut engine);
    engine
}

fn register_share_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptShare>("ShareLinkInfo")
        .register_get("share_key", |share: &mut ScriptShare| share.share_key())
        .register_get("share_password", |share: &mut ScriptShare| share.share_password())
        .register_get("share_url", |share: &mut ScriptShare| share.share_url())
        .register_get("standard_url", |share: &mut ScriptShare| share.standard_url())
        .register_get("parser_type", |share: &mut ScriptShare| share.parser_type())
        .register_get("provider_name", |share: &mut ScriptShare| share.provider_name())
        .register_fn("param", |share: &mut ScriptShare, key: &str| share.param(key))
        .register_fn("has_param", |share: &mut ScriptShare, key: &str| share.has_param(key))
        .register_fn("put_param", |share: &mut ScriptShare, key: &str, value: Dynamic| {
            share.put_param(key, &value);
        });
}

fn register_http_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptHttp>("Http")
        .register_fn("get", |http: &mut ScriptHttp, url: &str| http.get(url))
        .register_fn("get_no_redirect", |http: &mut ScriptHttp, url: &str| {
            http.get_no_redirect(url)
        })
        .register_fn("get_async", |http: &mut ScriptHttp, url: &str| http.get_async(url))
        .register_fn("post", |http: &mut ScriptHttp, url: &str, body: &str| {
            http.post(url, body)
        })
        .register_fn("post_json", |http: &mut ScriptHttp, url: &str, data: Dynamic| {
            http.post_json(url, &data)
        })
        .register_fn("post_form", |http: &mut ScriptHttp, url: &str, fields: ScriptMap| {
            http.post_form(url, &fields)
        })
        .register_fn("post_multipart", |http: &mut ScriptHttp, url: &str, fields: ScriptMap| {
            http.post_multipart(url, &fields)
        })
        .register_fn("request", |http: &mut ScriptHttp, method: &str, url: &str| {
            http.request(method, url, &ScriptMap::new(), "")
        })
        .register_fn(
            "request",
            |http: &mut ScriptHttp, method: &str, url: &str, headers: ScriptMap| {
                http.request(method, url, &headers, "")
            },
        )
        .register_fn(
            "request",
            |http: &mut ScriptHttp, method: &str, url: &str, headers: ScriptMap, body: &str| {
                http.request(method, url, &headers, body)
            },
        )
        .register_fn("put_header", |http: &mut ScriptHttp, name: &str, value: &str| {
            http.put_header(name, value);
        });

    engine
        .register_type_with_name::<ScriptResponse>("HttpResponse")
        .register_get("status", |response: &mut ScriptResponse| response.status())
        .register_get("body", |response: &mut ScriptResponse| response.body())
        .register_fn("header", |response: &mut ScriptResponse, name: &str| {
            response.header(name)
        })
        .register_fn("headers", |response: &mut ScriptResponse| response.headers())
        .register_fn("is_success", |response: &mut ScriptResponse| response.is_success())
        .register_fn("json", |response: &mut ScriptResponse| response.json());
}

fn register_logger_api(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptLogger>("Logger");
    for (name, level) in [
        ("debug", ScriptLogLevel::Debug),
        ("info", ScriptLogLevel::Info),
        ("warn", ScriptLogLevel::Warn),
        ("error", ScriptLogLevel::Error),
    ] {
        engine.register_fn(name, move |logger: &mut ScriptLogger, message: Dynamic| {
            logger.log(level, &message.to_string());
        });
    }
}

fn register_promise_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptPromise>("Promise")
        .register_fn("promise", ScriptPromise::pending)
        .register_fn("resolved", ScriptPromise::fulfilled)
        .register_fn("rejected", ScriptPromise::rejected)
        .register_fn(
            "resolve",
            |ctx: NativeCallContext, promise: &mut ScriptPromise, value: Dynamic| {
                promise.settle(&ctx, Ok(value))
            },
        )
        .register_fn(
            "reject",
            |ctx: NativeCallContext, promise: &mut ScriptPromise, reason: Dynamic| {
                promise.settle(&ctx, Err(reason))
            },
        )
        .register_fn(
            "then",
            |ctx: NativeCallContext, promise: &mut ScriptPromise, on_fulfilled: FnPtr| {
                promise.then(&ctx, Some(on_fulfilled), None)
            },
        )
        .register_fn(
            "then",
            |ctx: NativeCallContext,
             promise: &mut ScriptPromise,
             on_fulfilled: FnPtr,
             on_rejected: FnPtr| {
                promise.then(&ctx, Some(on_fulfilled), Some(on_rejected))
            },
        )
        .register_fn(
            "on_error",
            |ctx: NativeCallContext, promise: &mut ScriptPromise, on_rejected: FnPtr| {
                promise.then(&ctx, None, Some(on_rejected))
            },
        )
        .register_fn("is_settled", |promise: &mut ScriptPromise| promise.is_settled());
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rhai::EvalAltResult;
    use std::time::Duration;

    fn engine(deadline: Instant) -> Engine {
        invocation_engine(
            &SandboxLimits::default(),
            deadline,
            Arc::new(AtomicBool::new(false)),
            &ScriptLogger::new("test"),
        )
    }

    #[test]
    fn test_eval_is_disabled() {
        let engine = restricted_engine(&SandboxLimits::default());
        assert!(engine.compile(r#"eval("1 + 1")"#).is_err());
    }

    #[test]
    fn test_import_cannot_reach_filesystem() {
        let engine = restricted_engine(&SandboxLimits::default());
        let err = engine.run(r#"import "/etc/passwd" as p;"#).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorModuleNotFound(..)), "{err}");
    }

    #[test]
    fn test_deadline_terminates_loop() {
        let engine = engine(Instant::now());
        let err = engine.run("let n = 0; loop { n += 1; }").unwrap_err();
        match *err {
            EvalAltResult::ErrorTerminated(token, _) => {
                assert_eq!(token.as_int().unwrap(), TERMINATED_BY_DEADLINE);
            }
            other => panic!("expected termination, got {other}"),
        }
    }

    #[test]
    fn test_promise_chain_runs_handlers_in_order() {
        let engine = engine(Instant::now() + Duration::from_secs(5));
        let script = r#"
            let p = promise();
            let out = p.then(|v| v + 1).then(|v| v * 10);
            p.resolve(4);
            p.resolve(100);
            out
        "#;
        let result = engine.eval::<ScriptPromise>(script).unwrap();
        assert_eq!(result.outcome().unwrap().unwrap().as_int().unwrap(), 50);
    }

    #[test]
    fn test_thrown_handler_rejects_and_on_error_recovers() {
        let engine = engine(Instant::now() + Duration::from_secs(5));
        let script = r#"
            resolved(1)
                .then(|v| { throw "bad " + v; })
                .on_error(|e| "recovered: " + e)
        "#;
        let result = engine.eval::<ScriptPromise>(script).unwrap();
        let value = result.outcome().unwrap().unwrap();
        assert_eq!(value.into_string().unwrap(), "recovered: bad 1");
    }

    #[test]
    fn test_resolving_with_promise_adopts_its_outcome() {
        let engine = engine(Instant::now() + Duration::from_secs(5));
        let script = r#"
            let inner = promise();
            let outer = promise();
            outer.resolve(inner);
            inner.reject("inner failed");
            outer
        "#;
        let result = engine.eval::<ScriptPromise>(script).unwrap();
        let reason = result.outcome().unwrap().unwrap_err();
        assert_eq!(reason.into_string().unwrap(), "inner failed");
    }
}
