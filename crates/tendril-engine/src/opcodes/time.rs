//! `time` library

use super::{native, number};
use crate::context::ExecContext;
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use std::sync::Arc;
use std::time::Duration;
use tendril_core::Result;

const CATEGORY: &str = "time";

/// Longest single `time.sleep`.
const MAX_SLEEP_MS: f64 = 60_000.0;

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![native("time.now", CATEGORY, Arity::Fixed(0), now), Arc::new(Sleep)]
}

/// Milliseconds since the Unix epoch.
fn now(_opcode: &str, _args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Number(chrono::Utc::now().timestamp_millis() as f64))
}

/// Suspends the invocation without blocking the thread.
struct Sleep;

#[async_trait::async_trait]
impl Opcode for Sleep {
    fn name(&self) -> &str { "time.sleep" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Fixed(1) }
    fn is_async(&self) -> bool { true }

    async fn call(&self, args: Vec<Value>, _ctx: &mut ExecContext) -> Result<Value> {
        let ms = number(self.name(), &args, 0)?.clamp(0.0, MAX_SLEEP_MS);
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        Ok(Value::Null)
    }
}
