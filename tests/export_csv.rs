use std::sync::{Arc, Mutex};

use bson::{Bson, Document, doc};
use futures::{StreamExt, stream};
use mongo_exportable::config::{Config, EscapeMode};
use mongo_exportable::export::{
    ExportOptions, ExportSource, ExportSummary, ExportableModel, MemoryStore, QueryFilter,
    TextIndexSearch, export_csv,
};
use mongo_exportable::schema::{
    DescriptorMapping, ExportDescriptor, ExportableRegistry, FieldDef, FieldExport, Formatted,
    Schema,
};
use mongo_exportable::{ExportableError, compile};

fn user_schema() -> Schema {
    Schema::from_document(&doc! {
        "name": { "type": "String", "exportable": { "order": 1 } },
        "contact": {
            "phone": { "type": "String", "exportable": { "order": 3 } },
            "email": { "type": "String" },
        },
        "age": { "type": "Number", "exportable": { "order": 2 } },
    })
}

fn users() -> MemoryStore {
    MemoryStore::new(
        "users",
        vec![
            doc! {
                "name": "Doe, John",
                "age": 52,
                "contact": { "phone": "555-0100", "email": "john@example.com" },
                "updatedAt": 1,
            },
            doc! { "name": "Amy", "age": 30, "updatedAt": 3 },
            doc! { "name": "Bo", "contact": { "phone": "555-0199" }, "updatedAt": 2 },
        ],
    )
    .with_text_fields(["name"])
}

async fn collect(stream: mongo_exportable::CsvStream) -> String {
    let chunks: Vec<Vec<u8>> = stream.map(|chunk| chunk.unwrap()).collect().await;
    String::from_utf8(chunks.concat()).unwrap()
}

#[tokio::test]
async fn model_export_end_to_end() {
    let registry = ExportableRegistry::default();
    let model = ExportableModel::attach(
        &registry,
        Arc::new(users()),
        &user_schema(),
        Config::default().export,
    );

    let exported = model.export_csv_to(ExportOptions::new(), Vec::new()).await.unwrap();

    assert_eq!(
        String::from_utf8(exported.sink).unwrap(),
        "Name,Age,Phone\n\
         Amy,30,NA\n\
         Bo,0,555-0199\n\
         Doe; John,52,555-0100\n"
    );
    assert_eq!(exported.summary.records, 3);
    assert!(!exported.summary.cancelled);
}

#[tokio::test]
async fn quote_mode_keeps_commas() {
    let mut settings = Config::default().export;
    settings.escape = EscapeMode::Quote;

    let registry = ExportableRegistry::default();
    let model = ExportableModel::attach(&registry, Arc::new(users()), &user_schema(), settings)
        .with_search(TextIndexSearch);

    let options = ExportOptions::new().filter(QueryFilter::new().search("doe"));
    let csv = collect(model.export_csv(options)).await;

    assert_eq!(csv, "Name,Age,Phone\n\"Doe, John\",52,555-0100\n");
}

#[tokio::test]
async fn attach_is_idempotent_across_models() {
    let registry = ExportableRegistry::default();
    let store = Arc::new(users());

    let first = ExportableModel::attach(&registry, store.clone(), &user_schema(), Default::default());
    let second = ExportableModel::attach(
        &registry,
        store,
        &Schema::new().field("name", FieldDef::string().exportable(true)),
        Default::default(),
    );

    assert_eq!(first.mapping().paths(), second.mapping().paths());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn fan_out_formatter_adds_columns() {
    let schema = Schema::new()
        .field(
            "name",
            FieldDef::string().exportable(FieldExport::new().format(|value, _| {
                let full = value.as_str().unwrap_or_default();
                let (last, first) = full.split_once(", ").unwrap_or(("", full));
                Ok(Some(Formatted::columns(doc! { "First": first, "Last": last })))
            })),
        )
        .field("age", FieldDef::number().exportable(true));
    let mapping = compile(&schema, &Default::default());

    let source = ExportSource::stream(stream::iter(vec![
        Ok(doc! { "name": "Doe, John", "age": 52 }),
        Ok(doc! { "name": "Amy" }),
    ]));
    let csv = collect(export_csv(source, &mapping, &Default::default(), ExportOptions::new())).await;

    assert_eq!(csv, "First,Last,Age\nJohn,Doe,52\nAmy,,0\n");
}

#[tokio::test]
async fn status_fans_out_into_two_columns() {
    let schema = Schema::new()
        .field(
            "status",
            FieldDef::string().exportable(FieldExport::new().order(1).format(|value, _| {
                Ok(Some(Formatted::columns(doc! {
                    "Status Name": value.clone(),
                    "Status Weight": 1,
                })))
            })),
        )
        .field("name", FieldDef::string().exportable(FieldExport::new().order(2)));
    let mapping = compile(&schema, &Default::default());

    let source = ExportSource::stream(stream::iter(vec![
        Ok(doc! { "name": "Amy", "status": "open" }),
        Ok(doc! { "name": "Bo", "status": "closed" }),
    ]));
    let csv = collect(export_csv(source, &mapping, &Default::default(), ExportOptions::new())).await;

    assert_eq!(
        csv,
        "Status Name,Status Weight,Name\nopen,1,Amy\nclosed,1,Bo\n"
    );
}

#[tokio::test]
async fn aggregation_uses_override_wholesale() {
    let registry = ExportableRegistry::default();
    let model = ExportableModel::attach(&registry, Arc::new(users()), &user_schema(), Default::default());

    let overridden: DescriptorMapping = vec![
        ExportDescriptor::new("contact.email").with_header("Email"),
        ExportDescriptor::new("name").with_order(0),
    ]
    .into_iter()
    .collect();

    let csv = collect(
        model
            .aggregate(vec![doc! { "$sort": { "updatedAt": 1 } }])
            .export_csv(ExportOptions::new().exportables(overridden)),
    )
    .await;

    assert_eq!(csv, "Name,Email\nDoe; John,john@example.com\nBo,\nAmy,\n");
}

#[tokio::test]
async fn failure_is_reported_once() {
    let schema = Schema::new().field(
        "age",
        FieldDef::number().exportable(FieldExport::new().format(|value, _| match value {
            Bson::Int32(n) if *n < 0 => Err("negative age".into()),
            _ => Ok(None),
        })),
    );
    let mapping = compile(&schema, &Default::default());
    let outcomes: Arc<Mutex<Vec<Result<ExportSummary, String>>>> = Arc::default();
    let seen = outcomes.clone();

    let source = ExportSource::stream(stream::iter(vec![
        Ok::<Document, ExportableError>(doc! { "age": 3 }),
        Ok(doc! { "age": -1 }),
        Ok(doc! { "age": 7 }),
    ]));
    let options = ExportOptions::new().on_complete(move |outcome| {
        seen.lock()
            .unwrap()
            .push(outcome.cloned().map_err(|e| e.to_string()));
    });

    let result = mongo_exportable::export::export_csv_to(
        source,
        &mapping,
        &Default::default(),
        options,
        Vec::new(),
    )
    .await;

    assert!(matches!(result, Err(ExportableError::Format { ref path, .. }) if path == "age"));
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].as_ref().unwrap_err().contains("negative age"));
}

#[test]
fn missing_values_come_from_config() {
    let mut config = Config::from_toml(
        r#"
        [missing]
        number = -1
        string = "n/a"
        "#,
    )
    .unwrap();
    config.validate().unwrap();

    let mapping = compile(&user_schema(), &config.missing);
    let empty = Document::new();

    assert_eq!(
        mapping.get("age").unwrap().format(None, &empty).unwrap(),
        Formatted::scalar(-1)
    );
    assert_eq!(
        mapping.get("contact.phone").unwrap().format(None, &empty).unwrap(),
        Formatted::scalar("n/a")
    );
}
