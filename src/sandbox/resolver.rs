//! [`Resolver`] implementation backed by a sandboxed script.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::executor::{self, ScriptFailure};
use super::{
    BY_ID_ENTRY_POINT, ENTRY_POINT_ARITY, FILE_LIST_ENTRY_POINT, PARSE_ENTRY_POINT,
    SandboxLimits, ScriptLogEntry, ScriptProgram,
};
use crate::model::{FileInfo, ShareLinkInfo};
use crate::resolver::{ResolveContext, ResolveError, ResolvedUrl, Resolver};

/// Outcome of one `parse` run with everything the script logged.
#[derive(Debug)]
pub struct ScriptReport {
    pub outcome: Result<ResolvedUrl, ResolveError>,
    pub logs: Vec<ScriptLogEntry>,
    /// Parameters the script added to the share link.
    pub params: Map<String, Value>,
}

/// Runs a registered script for each request.
#[derive(Debug, Clone)]
pub struct ScriptedResolver {
    parser_type: String,
    program: ScriptProgram,
    limits: SandboxLimits,
}

impl ScriptedResolver {
    #[must_use]
    pub fn new(parser_type: impl Into<String>, program: ScriptProgram, limits: SandboxLimits) -> Self {
        Self {
            parser_type: parser_type.into(),
            program,
            limits,
        }
    }

    #[must_use]
    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// True when the script defines `parse_file_list(share, http, logger)`.
    #[must_use]
    pub fn supports_file_list(&self) -> bool {
        self.program
            .has_entry_point(FILE_LIST_ENTRY_POINT, ENTRY_POINT_ARITY)
    }

    /// True when the script defines `parse_by_id(share, http, logger)`.
    #[must_use]
    pub fn supports_by_id(&self) -> bool {
        self.program
            .has_entry_point(BY_ID_ENTRY_POINT, ENTRY_POINT_ARITY)
    }

    /// Runs `parse` and returns the result together with the captured logs.
    ///
    /// Parameters the script added are merged into `info` whether or not the
    /// run succeeded.
    #[instrument(skip(self, info, ctx), fields(parser_type = %self.parser_type, share_key = %info.share_key()))]
    pub async fn run(&self, info: &mut ShareLinkInfo, ctx: &ResolveContext) -> ScriptReport {
        let run = executor::invoke(
            &self.program,
            PARSE_ENTRY_POINT,
            info,
            ctx.http.clone(),
            self.limits,
        )
        .await;

        let params = run.params;
        info.merge_params(params.clone());

        let outcome = run
            .outcome
            .and_then(|value| executor::into_direct_url(value, PARSE_ENTRY_POINT))
            .map(ResolvedUrl::new)
            .map_err(|failure| self.report_failure(failure));
        if let Ok(resolved) = &outcome {
            info!(url = %resolved.url, logs = run.logs.len(), "Script resolved share link");
        }

        ScriptReport {
            outcome,
            logs: run.logs,
            params,
        }
    }

    fn report_failure(&self, failure: ScriptFailure) -> ResolveError {
        let error = failure.into_resolve_error(&self.parser_type);
        warn!(parser_type = %self.parser_type, error = %error, "Script resolution failed");
        error
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    fn name(&self) -> &str {
        &self.parser_type
    }

    async fn resolve(
        &self,
        info: &mut ShareLinkInfo,
        ctx: &ResolveContext,
    ) -> Result<ResolvedUrl, ResolveError> {
        self.run(info, ctx).await.outcome
    }

    async fn resolve_file_list(
        &self,
        info: &mut ShareLinkInfo,
        ctx: &ResolveContext,
    ) -> Result<Vec<FileInfo>, ResolveError> {
        if !self.supports_file_list() {
            return Err(ResolveError::unsupported(&self.parser_type, "file listing"));
        }
        let run = executor::invoke(
            &self.program,
            FILE_LIST_ENTRY_POINT,
            info,
            ctx.http.clone(),
            self.limits,
        )
        .await;
        info.merge_params(run.params);

        let files = run
            .outcome
            .and_then(|value| executor::into_file_list(value, FILE_LIST_ENTRY_POINT))
            .map_err(|failure| self.report_failure(failure))?;
        debug!(parser_type = %self.parser_type, files = files.len(), "Script listed files");
        Ok(files)
    }

    async fn resolve_by_id(
        &self,
        info: &mut ShareLinkInfo,
        ctx: &ResolveContext,
    ) -> Result<ResolvedUrl, ResolveError> {
        if !self.supports_by_id() {
            return Err(ResolveError::unsupported(&self.parser_type, "resolving by file id"));
        }
        let run = executor::invoke(
            &self.program,
            BY_ID_ENTRY_POINT,
            info,
            ctx.http.clone(),
            self.limits,
        )
        .await;
        info.merge_params(run.params);

        let resolved = run
            .outcome
            .and_then(|value| executor::into_direct_url(value, BY_ID_ENTRY_POINT))
            .map(ResolvedUrl::new)
            .map_err(|failure| self.report_failure(failure))?;
        debug!(parser_type = %self.parser_type, url = %resolved.url, "Script resolved file by id");
        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::{HttpError, HttpFetch, HttpRequest, HttpResponse};
    use std::sync::Arc;

    struct Offline;

    #[async_trait]
    impl HttpFetch for Offline {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            Err(HttpError::Timeout { url: request.url })
        }
    }

    fn resolver(source: &str) -> ScriptedResolver {
        ScriptedResolver::new(
            "demo",
            ScriptProgram::compile(source).unwrap(),
            SandboxLimits::default(),
        )
    }

    fn share() -> ShareLinkInfo {
        ShareLinkInfo::new("demo", "https://demo.example/s/k1")
            .with_share_key("k1")
            .with_password(Some("pw"))
    }

    #[tokio::test]
    async fn test_resolve_merges_script_params() {
        let resolver = resolver(
            r#"
            fn parse(share, http, logger) {
                share.put_param("downloadHeaders", #{ "Cookie": "sid=1" });
                `https://cdn.demo.example/${share.share_key}?p=${share.share_password}`
            }
            "#,
        );
        let ctx = ResolveContext::new(Arc::new(Offline));
        let mut info = share();
        let resolved = resolver.resolve(&mut info, &ctx).await.unwrap();
        assert_eq!(resolved.url, "https://cdn.demo.example/k1?p=pw");
        assert_eq!(info.other_params()["downloadHeaders"]["Cookie"], "sid=1");
    }

    #[tokio::test]
    async fn test_run_reports_logs_on_failure() {
        let resolver = resolver(
            r#"
            fn parse(share, http, logger) {
                logger.warn("about to fail");
                throw "link expired";
            }
            "#,
        );
        let ctx = ResolveContext::new(Arc::new(Offline));
        let report = resolver.run(&mut share(), &ctx).await;
        let err = report.outcome.unwrap_err();
        assert!(matches!(err, ResolveError::ResolutionFailed { .. }));
        assert!(err.to_string().contains("link expired"), "{err}");
        assert_eq!(report.logs[0].message, "about to fail");
    }

    #[tokio::test]
    async fn test_file_list_requires_entry_point() {
        let resolver = resolver("fn parse(share, http, logger) { \"x\" }");
        let ctx = ResolveContext::new(Arc::new(Offline));
        let err = resolver.resolve_file_list(&mut share(), &ctx).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_file_list_returns_files() {
        let resolver = resolver(
            r#"
            fn parse(share, http, logger) { "x" }
            fn parse_file_list(share, http, logger) {
                [#{ fileName: "a.txt", size: 3 }, #{ fileName: "b.txt" }]
            }
            "#,
        );
        assert!(resolver.supports_file_list());
        let ctx = ResolveContext::new(Arc::new(Offline));
        let files = resolver.resolve_file_list(&mut share(), &ctx).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].file_name.as_deref(), Some("b.txt"));
    }

    #[tokio::test]
    async fn test_by_id_reads_param_json() {
        let resolver = resolver(
            r#"
            fn parse(share, http, logger) { "x" }
            fn parse_by_id(share, http, logger) {
                let file = share.param("paramJson");
                if type_of(file) == "()" { throw "paramJson is missing"; }
                "https://cdn.demo.example/" + share.share_key + "/" + file.fileId
            }
            "#,
        );
        assert!(resolver.supports_by_id());
        let ctx = ResolveContext::new(Arc::new(Offline));

        let mut info = share().with_param("paramJson", serde_json::json!({ "fileId": "f7" }));
        let resolved = resolver.resolve_by_id(&mut info, &ctx).await.unwrap();
        assert_eq!(resolved.url, "https://cdn.demo.example/k1/f7");

        let err = resolver.resolve_by_id(&mut share(), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("paramJson is missing"), "{err}");
    }

    #[tokio::test]
    async fn test_by_id_requires_entry_point() {
        let resolver = resolver("fn parse(share, http, logger) { \"x\" }");
        assert!(!resolver.supports_by_id());
        let ctx = ResolveContext::new(Arc::new(Offline));
        let err = resolver.resolve_by_id(&mut share(), &ctx).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unsupported { .. }));
    }
}
