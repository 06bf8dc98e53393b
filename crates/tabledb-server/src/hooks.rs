//! Before/after hooks around deletes and creates.

use std::sync::Arc;

use rusqlite::Connection;
use tabledb_core::{Fields, Value};
use tracing::error;

use crate::error::Error;
use crate::request::Request;

/// Payload key naming the table a before-delete hook is asked about.
pub const TYPE_KEY: &str = "__type";

/// What a hook sees besides its payload.
pub struct HookContext<'a> {
    /// Table the operation targets.
    pub table: &'a str,
    /// The request being served.
    pub request: &'a Request,
    /// The open transaction; hooks must not commit or roll it back.
    pub tx: &'a Connection,
}

/// A hook run around an operation.
///
/// A before hook vetoes by returning an empty list, and fails the operation
/// by returning an error. Both default implementations pass the payload
/// through unchanged.
pub trait Interceptor: Send + Sync {
    /// Name used in logs and veto errors.
    fn name(&self) -> &str;

    /// Called before the operation.
    fn intercept_before(&self, ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
        let _ = ctx;
        Ok(payload)
    }

    /// Called after the operation succeeded, before commit.
    fn intercept_after(&self, ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
        let _ = ctx;
        Ok(payload)
    }
}

/// Ordered hook lists shared by every resource.
#[derive(Clone, Default)]
pub struct HookRegistry {
    before_delete: Vec<Arc<dyn Interceptor>>,
    after_delete: Vec<Arc<dyn Interceptor>>,
    before_create: Vec<Arc<dyn Interceptor>>,
    after_create: Vec<Arc<dyn Interceptor>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a before-delete hook.
    pub fn with_before_delete(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.before_delete.push(hook);
        self
    }

    /// Append an after-delete hook.
    pub fn with_after_delete(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.after_delete.push(hook);
        self
    }

    /// Append a before-create hook.
    pub fn with_before_create(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.before_create.push(hook);
        self
    }

    /// Append an after-create hook.
    pub fn with_after_create(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.after_create.push(hook);
        self
    }

    /// Run before-delete hooks. Each hook sees `{reference_id, __type}`.
    pub(crate) fn before_delete(&self, ctx: &HookContext<'_>, reference_id: &str) -> Result<(), Error> {
        for hook in &self.before_delete {
            let payload = vec![vec![
                ("reference_id".to_string(), Value::from(reference_id)),
                (TYPE_KEY.to_string(), Value::from(ctx.table)),
            ]];
            let result = hook.intercept_before(ctx, payload).inspect_err(|e| {
                error!(hook = hook.name(), table = ctx.table, reference_id, error = %e, "before delete hook failed");
            })?;
            if result.is_empty() {
                return Err(Error::HookVeto {
                    hook: hook.name().to_string(),
                    reference_id: reference_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run after-delete hooks. Each hook sees `{reference_id}`.
    pub(crate) fn after_delete(&self, ctx: &HookContext<'_>, reference_id: &str) -> Result<(), Error> {
        for hook in &self.after_delete {
            let payload = vec![vec![("reference_id".to_string(), Value::from(reference_id))]];
            hook.intercept_after(ctx, payload).inspect_err(|e| {
                error!(hook = hook.name(), table = ctx.table, reference_id, error = %e, "after delete hook failed");
            })?;
        }
        Ok(())
    }

    /// Run before-create hooks in order, each receiving the previous output.
    pub(crate) fn before_create(&self, ctx: &HookContext<'_>, record: Fields) -> Result<Fields, Error> {
        let mut record = record;
        for hook in &self.before_create {
            let mut result = hook.intercept_before(ctx, vec![record])?;
            if result.is_empty() {
                return Err(Error::HookVeto {
                    hook: hook.name().to_string(),
                    reference_id: String::new(),
                });
            }
            record = result.swap_remove(0);
        }
        Ok(record)
    }

    /// Run after-create hooks.
    pub(crate) fn after_create(&self, ctx: &HookContext<'_>, record: &Fields) -> Result<(), Error> {
        for hook in &self.after_create {
            hook.intercept_after(ctx, vec![record.clone()])?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |hooks: &[Arc<dyn Interceptor>]| hooks.iter().map(|h| h.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("HookRegistry")
            .field("before_delete", &names(&self.before_delete))
            .field("after_delete", &names(&self.after_delete))
            .field("before_create", &names(&self.before_create))
            .field("after_create", &names(&self.after_create))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tabledb_core::Principal;

    struct Recorder {
        name: String,
        seen: Mutex<Vec<Fields>>,
        veto: bool,
    }

    impl Recorder {
        fn new(name: &str, veto: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                veto,
            })
        }
    }

    impl Interceptor for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn intercept_before(&self, _ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
            self.seen.lock().extend(payload.iter().cloned());
            if self.veto {
                Ok(Vec::new())
            } else {
                Ok(payload)
            }
        }

        fn intercept_after(&self, _ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
            self.seen.lock().extend(payload.iter().cloned());
            Ok(payload)
        }
    }

    struct Stamp;

    impl Interceptor for Stamp {
        fn name(&self) -> &str {
            "stamp"
        }

        fn intercept_before(&self, _ctx: &HookContext<'_>, mut payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
            for record in &mut payload {
                record.push(("stamped".to_string(), Value::Boolean(true)));
            }
            Ok(payload)
        }
    }

    fn with_ctx<R>(f: impl FnOnce(&HookContext<'_>) -> R) -> R {
        let conn = Connection::open_in_memory().unwrap();
        let request = Request::delete(Principal::user("alice"));
        let ctx = HookContext {
            table: "invoice",
            request: &request,
            tx: &conn,
        };
        f(&ctx)
    }

    #[test]
    fn test_before_delete_payload() {
        let recorder = Recorder::new("recorder", false);
        let hooks = HookRegistry::new().with_before_delete(recorder.clone());

        with_ctx(|ctx| hooks.before_delete(ctx, "inv-1")).unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(
            seen[0],
            vec![
                ("reference_id".to_string(), Value::from("inv-1")),
                ("__type".to_string(), Value::from("invoice")),
            ]
        );
    }

    #[test]
    fn test_after_delete_payload() {
        let recorder = Recorder::new("recorder", false);
        let hooks = HookRegistry::new().with_after_delete(recorder.clone());

        with_ctx(|ctx| hooks.after_delete(ctx, "inv-1")).unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![("reference_id".to_string(), Value::from("inv-1"))]);
    }

    #[test]
    fn test_empty_result_vetoes_and_stops() {
        let veto = Recorder::new("guard", true);
        let later = Recorder::new("later", false);
        let hooks = HookRegistry::new()
            .with_before_delete(veto)
            .with_before_delete(later.clone());

        let err = with_ctx(|ctx| hooks.before_delete(ctx, "inv-1")).unwrap_err();
        assert!(matches!(err, Error::HookVeto { ref hook, .. } if hook == "guard"));
        assert!(later.seen.lock().is_empty());
    }

    #[test]
    fn test_before_create_chains_rewrites() {
        let recorder = Recorder::new("recorder", false);
        let hooks = HookRegistry::new()
            .with_before_create(Arc::new(Stamp))
            .with_before_create(recorder.clone());

        let record = with_ctx(|ctx| hooks.before_create(ctx, vec![("title".to_string(), Value::from("x"))])).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(recorder.seen.lock()[0], record);
    }
}
