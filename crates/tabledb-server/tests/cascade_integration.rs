//! Integration tests for cascading deletes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;

use tabledb_core::{
    AccessPolicy, BlobDescriptor, Catalog, CloudStore, ColumnDef, ColumnType, Fields,
    PermissionBits, PermissionScope, Principal, RelationDef, RowStore, SchemaDocument, TableDef,
    Value,
};
use tabledb_server::{
    BlobCleaner, BlobDeleteAction, BlobDeleteRequest, BlobError, CascadeWarning, Database,
    DeleteResponse, Error, ErrorKind, HookContext, HookRegistry, Interceptor, RegistryBuilder,
    Request, ResourceRegistry, SharedDatabase,
};

#[derive(Default)]
struct RecordingBlobs {
    requests: Mutex<Vec<BlobDeleteRequest>>,
    fail: AtomicBool,
}

impl BlobDeleteAction for RecordingBlobs {
    fn delete(&self, request: &BlobDeleteRequest) -> Vec<BlobError> {
        self.requests.lock().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            vec![BlobError::InvalidRoot {
                root: request.root_path.clone(),
                message: "store offline".into(),
            }]
        } else {
            Vec::new()
        }
    }
}

/// Vetoes deletes of one table.
struct Veto(&'static str);

impl Interceptor for Veto {
    fn name(&self) -> &str {
        "veto"
    }

    fn intercept_before(&self, ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
        if ctx.table == self.0 {
            Ok(Vec::new())
        } else {
            Ok(payload)
        }
    }
}

/// Fails after deletes of one table.
struct FailAfter(&'static str);

impl Interceptor for FailAfter {
    fn name(&self) -> &str {
        "fail-after"
    }

    fn intercept_after(&self, ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
        if ctx.table == self.0 {
            Err(Error::hook(self.name(), "notification queue unavailable"))
        } else {
            Ok(payload)
        }
    }
}

/// Records the `__type` of every before-delete payload.
#[derive(Default)]
struct SeenTypes(Mutex<Vec<String>>);

impl Interceptor for SeenTypes {
    fn name(&self) -> &str {
        "seen-types"
    }

    fn intercept_before(&self, _ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
        for record in &payload {
            if let Some((_, Value::Text(table))) = record.iter().find(|(k, _)| k == "__type") {
                self.0.lock().push(table.clone());
            }
        }
        Ok(payload)
    }
}

/// Records the table of every after-delete call.
#[derive(Default)]
struct SeenAfter(Mutex<Vec<String>>);

impl Interceptor for SeenAfter {
    fn name(&self) -> &str {
        "seen-after"
    }

    fn intercept_after(&self, ctx: &HookContext<'_>, payload: Vec<Fields>) -> Result<Vec<Fields>, Error> {
        self.0.lock().push(ctx.table.to_string());
        Ok(payload)
    }
}

fn schema(asset_root: &str) -> SchemaDocument {
    SchemaDocument::new()
        .with_cloud_store(CloudStore::new("assets", "local", asset_root))
        .with_table(TableDef::new("customer").with_column(ColumnDef::required("name", ColumnType::Text)))
        .with_table(TableDef::new("address").with_column(ColumnDef::new("street", ColumnType::Text)))
        .with_table(
            TableDef::new("invoice")
                .with_column(ColumnDef::required("number", ColumnType::Text))
                .with_column(ColumnDef::files("attachments", "assets", "invoices"))
                .with_audit(),
        )
        .with_table(TableDef::new("invoice_line").with_column(ColumnDef::new("amount", ColumnType::Real)))
        .with_table(TableDef::new("tag").with_column(ColumnDef::new("label", ColumnType::Text)))
        .with_table(
            TableDef::new("article")
                .with_column(ColumnDef::new("title", ColumnType::Text))
                .with_translations(),
        )
        .with_table(TableDef::new("left_node"))
        .with_table(TableDef::new("right_node"))
        .with_relation(RelationDef::belongs_to("address", "customer"))
        .with_relation(RelationDef::has_many("invoice", "invoice_line"))
        .with_relation(RelationDef::has_many_and_belongs_to_many("invoice", "tag"))
        .with_relation(RelationDef::has_one("left_node", "right_node"))
        .with_relation(RelationDef::has_one("right_node", "left_node"))
}

fn owner_all() -> PermissionBits {
    PermissionBits::scope_all(PermissionScope::Owner)
}

fn alice() -> Request {
    Request::delete(Principal::user("alice"))
}

struct TestContext {
    database: SharedDatabase,
    registry: Arc<ResourceRegistry>,
    blobs: Arc<RecordingBlobs>,
    _asset_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with(|builder| builder)
    }

    fn with_hooks(hooks: HookRegistry) -> Self {
        Self::with(|builder| builder.with_hooks(hooks))
    }

    fn with(configure: impl FnOnce(RegistryBuilder) -> RegistryBuilder) -> Self {
        let asset_dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(schema(&asset_dir.path().display().to_string())).unwrap();
        let database = Arc::new(Database::open_in_memory(catalog).unwrap());
        database.install_schema().unwrap();

        let blobs = Arc::new(RecordingBlobs::default());
        let builder = ResourceRegistry::builder(database.clone())
            .with_blob_cleaner(BlobCleaner::new(blobs.clone()));
        let registry = configure(builder).build().unwrap();

        Self {
            database,
            registry,
            blobs,
            _asset_dir: asset_dir,
        }
    }

    fn insert(&self, table: &str, reference_id: &str, owner: &str, permission: PermissionBits, extra: Fields) -> i64 {
        let conn = self.database.lock();
        let store = RowStore::new(&conn, self.database.catalog());
        let mut fields: Fields = vec![
            ("reference_id".into(), reference_id.into()),
            ("permission".into(), Value::Integer(permission.0)),
            ("owner_reference_id".into(), owner.into()),
        ];
        fields.extend(extra);
        store.insert(table, &fields).unwrap()
    }

    fn grant(&self, table: &str, id: i64, group: &str) {
        let conn = self.database.lock();
        RowStore::new(&conn, self.database.catalog())
            .grant_group(table, id, group, PermissionBits::scope_all(PermissionScope::Group))
            .unwrap();
    }

    fn link(&self, join_table: &str, reference_id: &str, subject: (&str, i64), object: (&str, i64)) {
        self.insert(
            join_table,
            reference_id,
            "",
            PermissionBits::NONE,
            vec![
                (subject.0.into(), Value::Integer(subject.1)),
                (object.0.into(), Value::Integer(object.1)),
            ],
        );
    }

    fn invoice(&self, reference_id: &str, owner: &str) -> i64 {
        self.insert(
            "invoice",
            reference_id,
            owner,
            owner_all(),
            vec![("number".into(), Value::from(format!("no-{}", reference_id)))],
        )
    }

    fn delete(&self, table: &str, reference_id: &str, request: &Request) -> Result<DeleteResponse, Error> {
        self.registry.deleter(table)?.delete(reference_id, request)
    }

    fn count(&self, table: &str) -> i64 {
        self.database
            .lock()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| r.get(0))
            .unwrap()
    }

    fn exists(&self, table: &str, reference_id: &str) -> bool {
        let count: i64 = self
            .database
            .lock()
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\" WHERE reference_id = ?1", table),
                [reference_id],
                |r| r.get(0),
            )
            .unwrap();
        count > 0
    }

    /// Every row of every table.
    fn snapshot(&self) -> Vec<(String, Vec<Vec<SqlValue>>)> {
        let conn = self.database.lock();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        tables
            .into_iter()
            .map(|table| {
                let mut stmt = conn
                    .prepare(&format!("SELECT * FROM \"{}\" ORDER BY rowid", table))
                    .unwrap();
                let columns = stmt.column_count();
                let rows = stmt
                    .query_map([], |r| {
                        (0..columns)
                            .map(|i| r.get::<_, SqlValue>(i))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .unwrap()
                    .collect::<Result<Vec<Vec<SqlValue>>, _>>()
                    .unwrap();
                (table, rows)
            })
            .collect()
    }
}

/// Invoice with three lines; alice owns the invoice and the lines listed in `alice_lines`.
fn invoice_with_lines(ctx: &TestContext, alice_lines: &[bool; 3]) -> i64 {
    let invoice = ctx.invoice("inv", "alice");
    for (i, owned) in alice_lines.iter().enumerate() {
        let owner = if *owned { "alice" } else { "bob" };
        let line = ctx.insert(
            "invoice_line",
            &format!("line-{}", i),
            owner,
            owner_all(),
            vec![("amount".into(), Value::Real(10.0))],
        );
        ctx.link(
            "invoice_invoice_line",
            &format!("join-{}", i),
            ("invoice_id", invoice),
            ("invoice_line_id", line),
        );
    }
    invoice
}

#[test]
fn test_unauthorized_dependent_blocks_whole_delete() {
    let ctx = TestContext::new();
    invoice_with_lines(&ctx, &[true, true, false]);
    let before = ctx.snapshot();

    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(ctx.count("invoice_invoice_line"), 3);
    assert!(ctx.exists("invoice", "inv"));
    assert_eq!(ctx.count("invoice_audit"), 0);
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn test_authorized_has_many_purges_join_rows_only() {
    let hooks = Arc::new(SeenTypes::default());
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(hooks.clone()));
    invoice_with_lines(&ctx, &[true, true, true]);

    let response = ctx.delete("invoice", "inv", &alice()).unwrap();

    assert_eq!(response.status, 200);
    assert!(!ctx.exists("invoice", "inv"));
    assert_eq!(ctx.count("invoice_invoice_line"), 0);
    assert_eq!(ctx.count("invoice_line"), 3);
    assert!(response.report.contains("invoice_invoice_line", "join-2"));
    assert_eq!(response.report.deleted.last().unwrap().table, "invoice");
    // join rows are purged, so only the invoice itself went through the hooks
    assert_eq!(*hooks.0.lock(), vec!["invoice".to_string()]);
}

#[test]
fn test_group_grant_authorizes_dependent() {
    let ctx = TestContext::new();
    invoice_with_lines(&ctx, &[true, true, false]);
    let bobs_line: i64 = ctx
        .database
        .lock()
        .query_row("SELECT id FROM invoice_line WHERE reference_id = 'line-2'", [], |r| r.get(0))
        .unwrap();
    ctx.grant("invoice_line", bobs_line, "accounting");

    let request = Request::delete(Principal::user("alice").with_group("accounting"));
    ctx.delete("invoice", "inv", &request).unwrap();

    assert_eq!(ctx.count("invoice_invoice_line"), 0);
}

#[test]
fn test_admin_bypasses_object_permissions() {
    let ctx = TestContext::new();
    invoice_with_lines(&ctx, &[false, false, false]);

    ctx.delete("invoice", "inv", &Request::delete(Principal::admin("root")))
        .unwrap();

    assert!(!ctx.exists("invoice", "inv"));
    assert_eq!(ctx.count("invoice_invoice_line"), 0);
}

#[test]
fn test_admin_group_bypasses_object_permissions() {
    let ctx = TestContext::with(|builder| {
        builder.with_policy(AccessPolicy::new().with_admin_group("administrators"))
    });
    invoice_with_lines(&ctx, &[false, false, false]);

    let request = Request::delete(Principal::user("carol").with_group("administrators"));
    ctx.delete("invoice", "inv", &request).unwrap();

    assert!(!ctx.exists("invoice", "inv"));
}

#[test]
fn test_audit_row_written_with_delete() {
    let ctx = TestContext::new();
    ctx.invoice("inv", "alice");

    let response = ctx.delete("invoice", "inv", &alice()).unwrap();

    assert!(response.report.is_clean(), "{:?}", response.report.warnings);
    let (number, object, owner, reference): (String, String, String, String) = ctx
        .database
        .lock()
        .query_row(
            "SELECT number, audit_object_id, owner_reference_id, reference_id FROM invoice_audit",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .unwrap();
    assert_eq!(ctx.count("invoice_audit"), 1);
    assert_eq!(number, "no-inv");
    assert_eq!(object, "inv");
    assert_eq!(owner, "alice");
    assert_ne!(reference, "inv");
}

#[test]
fn test_missing_audit_handler_is_a_warning() {
    let ctx = TestContext::with(|builder| builder.without_handler("invoice_audit"));
    ctx.invoice("inv", "alice");

    let response = ctx.delete("invoice", "inv", &alice()).unwrap();

    assert!(!ctx.exists("invoice", "inv"));
    assert_eq!(ctx.count("invoice_audit"), 0);
    assert!(matches!(
        response.report.warnings.as_slice(),
        [CascadeWarning::AuditSkipped { .. }]
    ));
}

#[test]
fn test_audit_create_veto_is_a_warning() {
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_create(Arc::new(Veto("invoice_audit"))));
    ctx.invoice("inv", "alice");

    let response = ctx.delete("invoice", "inv", &alice()).unwrap();

    assert!(!ctx.exists("invoice", "inv"));
    assert!(matches!(
        response.report.warnings.as_slice(),
        [CascadeWarning::AuditFailed { .. }]
    ));
}

#[test]
fn test_failed_audit_create_leaves_no_snapshot() {
    let ctx = TestContext::with_hooks(HookRegistry::new().with_after_create(Arc::new(FailAfter("invoice_audit"))));
    ctx.invoice("inv", "alice");

    let response = ctx.delete("invoice", "inv", &alice()).unwrap();

    assert!(!ctx.exists("invoice", "inv"));
    assert_eq!(ctx.count("invoice_audit"), 0);
    assert!(matches!(
        response.report.warnings.as_slice(),
        [CascadeWarning::AuditFailed { audit_table, .. }] if audit_table == "invoice_audit"
    ));
}

#[test]
fn test_has_one_dependents_deleted_with_object() {
    let hooks = Arc::new(SeenTypes::default());
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(hooks.clone()));
    let customer = ctx.insert("customer", "cust", "alice", owner_all(), vec![("name".into(), "Ada".into())]);
    for street in ["home", "office"] {
        ctx.insert(
            "address",
            street,
            "alice",
            owner_all(),
            vec![("customer_id".into(), Value::Integer(customer))],
        );
    }
    ctx.insert("address", "elsewhere", "alice", owner_all(), Vec::new());

    let response = ctx.delete("customer", "cust", &alice()).unwrap();

    assert!(!ctx.exists("customer", "cust"));
    assert!(!ctx.exists("address", "home"));
    assert!(!ctx.exists("address", "office"));
    assert!(ctx.exists("address", "elsewhere"));
    assert_eq!(response.report.deleted.len(), 3);
    assert_eq!(*hooks.0.lock(), vec!["customer", "address", "address"]);
}

#[test]
fn test_failing_dependent_fails_parent() {
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(Arc::new(Veto("address"))));
    let customer = ctx.insert("customer", "cust", "alice", owner_all(), vec![("name".into(), "Ada".into())]);
    ctx.insert(
        "address",
        "home",
        "alice",
        owner_all(),
        vec![("customer_id".into(), Value::Integer(customer))],
    );
    let before = ctx.snapshot();

    let err = ctx.delete("customer", "cust", &alice()).unwrap_err();

    assert!(matches!(err, Error::HookVeto { ref reference_id, .. } if reference_id == "home"));
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn test_double_delete_is_not_found() {
    let ctx = TestContext::new();
    ctx.invoice("inv", "alice");

    ctx.delete("invoice", "inv", &alice()).unwrap();
    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(ctx.count("invoice_audit"), 1);
}

#[test]
fn test_unknown_table_has_no_handler() {
    let ctx = TestContext::new();
    assert!(matches!(
        ctx.delete("ledger", "x", &alice()),
        Err(Error::NoHandler(_))
    ));
}

#[test]
fn test_localized_delete_removes_only_preferred_translation() {
    let ctx = TestContext::new();
    let article = ctx.insert("article", "art", "alice", owner_all(), vec![("title".into(), "Hello".into())]);
    for (reference, language, title) in [("art-en", "en", "Hello"), ("art-fr", "fr", "Bonjour")] {
        ctx.database
            .lock()
            .execute(
                "INSERT INTO article_i18n (reference_id, permission, title, translation_reference_id, language_id) \
                 VALUES (?1, 0, ?2, ?3, ?4)",
                rusqlite::params![reference, title, article, language],
            )
            .unwrap();
    }

    let response = ctx
        .delete("article", "art", &alice().with_language("fr"))
        .unwrap();

    assert!(ctx.exists("article", "art"));
    assert!(ctx.exists("article_i18n", "art-en"));
    assert!(!ctx.exists("article_i18n", "art-fr"));
    assert_eq!(response.report.deleted[0].language.as_deref(), Some("fr"));

    let response = ctx
        .delete("article", "art", &alice().with_language("de"))
        .unwrap();
    assert!(response.report.deleted.is_empty());
    assert!(ctx.exists("article_i18n", "art-en"));

    ctx.delete("article", "art", &alice()).unwrap();
    assert!(!ctx.exists("article", "art"));
}

#[test]
fn test_blob_failure_does_not_block_delete() {
    let ctx = TestContext::new();
    ctx.blobs.fail.store(true, Ordering::SeqCst);
    let files = Value::Files(vec![BlobDescriptor::new("2024", "a.pdf"), BlobDescriptor::new("", "b.pdf")]);
    ctx.insert(
        "invoice",
        "inv",
        "alice",
        owner_all(),
        vec![("number".into(), "1".into()), ("attachments".into(), files)],
    );

    let response = ctx.delete("invoice", "inv", &alice()).unwrap();

    assert!(!ctx.exists("invoice", "inv"));
    let requests = ctx.blobs.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "2024/a.pdf");
    assert_eq!(requests[1].path, "b.pdf");
    assert!(requests[0].root_path.ends_with("/invoices"));
    let blob_warnings = response
        .report
        .warnings
        .iter()
        .filter(|w| matches!(w, CascadeWarning::BlobCleanup { .. }))
        .count();
    assert_eq!(blob_warnings, 2);
}

#[test]
fn test_object_store_removes_attachment_files() {
    let asset_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(schema(&asset_dir.path().display().to_string())).unwrap();
    let database = Arc::new(Database::open_in_memory(catalog).unwrap());
    database.install_schema().unwrap();
    let registry = ResourceRegistry::builder(database.clone()).build().unwrap();

    let folder = asset_dir.path().join("invoices").join("2024");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("a.pdf"), b"%PDF").unwrap();

    {
        let conn = database.lock();
        let files = Value::Files(vec![
            BlobDescriptor::new("2024", "a.pdf"),
            BlobDescriptor::new("2024", "gone.pdf"),
        ]);
        RowStore::new(&conn, database.catalog())
            .insert(
                "invoice",
                &vec![
                    ("reference_id".into(), "inv".into()),
                    ("permission".into(), Value::Integer(owner_all().0)),
                    ("number".into(), "1".into()),
                    ("attachments".into(), files),
                ],
            )
            .unwrap();
    }

    let response = registry
        .deleter("invoice")
        .unwrap()
        .delete("inv", &alice())
        .unwrap();

    assert!(!folder.join("a.pdf").exists());
    assert!(matches!(
        response.report.warnings.as_slice(),
        [CascadeWarning::BlobCleanup { path, .. }] if path == "2024/gone.pdf"
    ));
}

#[test]
fn test_before_hook_veto_rolls_back() {
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(Arc::new(Veto("invoice"))));
    invoice_with_lines(&ctx, &[true, true, true]);
    let before = ctx.snapshot();

    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HookVeto);
    assert_eq!(err.to_string(), "cannot delete this object [veto][inv]");
    assert_eq!(ctx.snapshot(), before);
    assert!(ctx.blobs.requests.lock().is_empty());
}

#[test]
fn test_after_hook_error_rolls_back() {
    let ctx = TestContext::with_hooks(HookRegistry::new().with_after_delete(Arc::new(FailAfter("invoice"))));
    invoice_with_lines(&ctx, &[true, true, true]);
    let before = ctx.snapshot();

    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();

    assert!(matches!(err, Error::Hook { .. }));
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn test_after_hooks_run_only_on_success() {
    let seen = Arc::new(SeenAfter::default());
    let ctx = TestContext::with_hooks(HookRegistry::new().with_after_delete(seen.clone()));
    invoice_with_lines(&ctx, &[true, true, false]);

    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(seen.0.lock().is_empty());

    ctx.delete("invoice", "inv", &Request::delete(Principal::admin("root")))
        .unwrap();
    assert_eq!(*seen.0.lock(), vec!["invoice".to_string()]);
}

#[test]
fn test_later_relation_failure_undoes_earlier_relation() {
    let ctx = TestContext::new();
    let invoice = invoice_with_lines(&ctx, &[true, true, true]);
    let tag = ctx.insert("tag", "theirs", "bob", owner_all(), Vec::new());
    ctx.link("invoice_tag", "it", ("invoice_id", invoice), ("tag_id", tag));
    let before = ctx.snapshot();

    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();

    assert!(matches!(err, Error::Unauthorized { ref relation, .. } if relation == "invoice has_many_and_belongs_to_many tag"));
    assert_eq!(ctx.count("invoice_invoice_line"), 3);
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn test_many_to_many_deletes_join_rows_with_hooks() {
    let hooks = Arc::new(SeenTypes::default());
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(hooks.clone()));
    let invoice = ctx.invoice("inv", "alice");
    for name in ["urgent", "paid"] {
        let tag = ctx.insert("tag", name, "alice", owner_all(), vec![("label".into(), name.into())]);
        ctx.link("invoice_tag", &format!("it-{}", name), ("invoice_id", invoice), ("tag_id", tag));
    }

    ctx.delete("invoice", "inv", &alice()).unwrap();

    assert_eq!(ctx.count("invoice_tag"), 0);
    assert_eq!(ctx.count("tag"), 2);
    assert_eq!(*hooks.0.lock(), vec!["invoice", "invoice_tag", "invoice_tag"]);
}

#[test]
fn test_many_to_many_requires_refer_on_every_object() {
    let ctx = TestContext::new();
    let invoice = ctx.invoice("inv", "alice");
    let mine = ctx.insert("tag", "mine", "alice", owner_all(), Vec::new());
    let theirs = ctx.insert("tag", "theirs", "bob", owner_all(), Vec::new());
    ctx.link("invoice_tag", "it-1", ("invoice_id", invoice), ("tag_id", mine));
    ctx.link("invoice_tag", "it-2", ("invoice_id", invoice), ("tag_id", theirs));
    let before = ctx.snapshot();

    let err = ctx.delete("invoice", "inv", &alice()).unwrap_err();

    assert!(matches!(err, Error::Unauthorized { ref relation, .. } if relation == "invoice has_many_and_belongs_to_many tag"));
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn test_deleting_object_purges_has_many_join_rows() {
    let hooks = Arc::new(SeenTypes::default());
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(hooks.clone()));
    invoice_with_lines(&ctx, &[true, true, true]);

    ctx.delete("invoice_line", "line-1", &alice()).unwrap();

    assert!(!ctx.exists("invoice_invoice_line", "join-1"));
    assert_eq!(ctx.count("invoice_invoice_line"), 2);
    assert!(ctx.exists("invoice", "inv"));
    assert_eq!(*hooks.0.lock(), vec!["invoice_line"]);
}

#[test]
fn test_deleting_object_deletes_many_to_many_join_rows() {
    let hooks = Arc::new(SeenTypes::default());
    let ctx = TestContext::with_hooks(HookRegistry::new().with_before_delete(hooks.clone()));
    let invoice = ctx.invoice("inv", "alice");
    let tag = ctx.insert("tag", "urgent", "alice", owner_all(), Vec::new());
    ctx.link("invoice_tag", "it", ("invoice_id", invoice), ("tag_id", tag));

    ctx.delete("tag", "urgent", &alice()).unwrap();

    assert_eq!(ctx.count("invoice_tag"), 0);
    assert!(ctx.exists("invoice", "inv"));
    assert_eq!(*hooks.0.lock(), vec!["tag", "invoice_tag"]);
}

#[test]
fn test_has_one_cycle_hits_depth_limit() {
    let ctx = TestContext::with(|builder| builder.with_max_cascade_depth(5));
    let left = ctx.insert("left_node", "l", "alice", owner_all(), Vec::new());
    let right = ctx.insert(
        "right_node",
        "r",
        "alice",
        owner_all(),
        vec![("left_node_id".into(), Value::Integer(left))],
    );
    ctx.database
        .lock()
        .execute("UPDATE left_node SET right_node_id = ?1 WHERE id = ?2", [right, left])
        .unwrap();
    let before = ctx.snapshot();

    let err = ctx.delete("left_node", "l", &alice()).unwrap_err();

    assert!(matches!(err, Error::CascadeDepthExceeded { depth: 6 }));
    assert_eq!(ctx.snapshot(), before);
}

#[test]
fn test_delete_with_caller_transaction() {
    let ctx = TestContext::new();
    ctx.invoice("inv", "alice");
    let deleter = ctx.registry.deleter("invoice").unwrap();

    {
        let mut conn = ctx.database.lock();
        let tx = conn.transaction().unwrap();
        deleter.delete_with_transaction("inv", &alice(), &tx).unwrap();
        let inside: i64 = tx
            .query_row("SELECT COUNT(*) FROM invoice", [], |r| r.get(0))
            .unwrap();
        assert_eq!(inside, 0);
        tx.rollback().unwrap();
    }

    assert!(ctx.exists("invoice", "inv"));
    assert_eq!(ctx.count("invoice_audit"), 0);
}
