//! The stage abstraction.

use async_trait::async_trait;
use axum::response::Response;

use crate::error::GatewayError;
use crate::pipeline::context::RequestContext;
use crate::routing::Route;

/// What a stage decided about a request.
#[derive(Debug)]
pub enum StageOutcome {
    /// Hand the (possibly rewritten) context to the next stage.
    Continue(RequestContext),
    /// Stop here and answer with this response.
    Respond(Response),
}

/// One link of the request pipeline.
///
/// Stages run in a fixed order for every matched route. A stage either
/// passes the context on, answers directly, or fails with a classified
/// [`GatewayError`].
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, route: &Route, ctx: RequestContext) -> Result<StageOutcome, GatewayError>;
}
