//! Writer tests against a running Postgres server.
//!
//! Connection settings are read from the environment:
//! - `TESTS_DATABASE_HOST`: server hostname. The tests are skipped when it is not set.
//! - `TESTS_DATABASE_PORT`: server port, `5432` by default.
//! - `TESTS_DATABASE_USERNAME`: database user, `postgres` by default.
//! - `TESTS_DATABASE_PASSWORD`: password, optional.
//! - `TESTS_DATABASE_NAME`: database the tables are created in, `postgres` by default.
//!
//! Every test writes into its own freshly named schema and drops it at the end.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use pglog::error::ErrorKind;
use pglog::types::{Field, Payload, TransportProto, TypeTag, Value};
use pglog::writer::postgres::PostgresWriter;
use pglog::writer::{WriterBackend, WriterInfo};
use telemetry::init_test_tracing;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use uuid::Uuid;

const HOST_ENV_NAME: &str = "TESTS_DATABASE_HOST";

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn test_conninfo() -> Option<String> {
    let host = std::env::var(HOST_ENV_NAME).ok()?;
    let mut conninfo = format!(
        "host={host} port={} user={} dbname={}",
        env_or("TESTS_DATABASE_PORT", "5432"),
        env_or("TESTS_DATABASE_USERNAME", "postgres"),
        env_or("TESTS_DATABASE_NAME", "postgres"),
    );
    if let Ok(password) = std::env::var("TESTS_DATABASE_PASSWORD") {
        conninfo.push_str(&format!(" password={password}"));
    }

    Some(conninfo)
}

/// A uniquely named schema on the test server plus a client for reading back rows.
struct TestSchema {
    client: Client,
    conninfo: String,
    name: String,
}

impl TestSchema {
    async fn spawn() -> Option<TestSchema> {
        let Some(conninfo) = test_conninfo() else {
            eprintln!("{HOST_ENV_NAME} is not set, skipping");
            return None;
        };

        let (client, connection) = tokio_postgres::connect(&conninfo, NoTls)
            .await
            .expect("Failed to connect to the test database");
        tokio::spawn(async move {
            let _ = connection.await;
        });

        Some(TestSchema {
            client,
            conninfo,
            name: format!("pglog_{}", Uuid::new_v4().simple()),
        })
    }

    fn info(&self, path: &str, options: &[(&str, &str)]) -> WriterInfo {
        let mut config = BTreeMap::from([
            ("conninfo".to_string(), self.conninfo.clone()),
            ("schema".to_string(), self.name.clone()),
        ]);
        for (key, value) in options {
            config.insert(key.to_string(), value.to_string());
        }

        WriterInfo::new(path, config)
    }

    /// Returns the rows of `columns` in `table`, in insertion order, as text.
    async fn rows(&self, table: &str, columns: &str) -> Vec<Vec<Option<String>>> {
        let query = format!("SELECT {columns} FROM {}.{table} ORDER BY id", self.name);

        self.client
            .simple_query(&query)
            .await
            .expect("Failed to read rows")
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .collect()
    }

    async fn cleanup(self) {
        self.client
            .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.name))
            .await
            .expect("Failed to drop the test schema");
    }
}

fn text(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn conn_fields() -> Vec<Field> {
    vec![
        Field::new("ts", TypeTag::Time),
        Field::new("uid", TypeTag::String),
        Field::new("port", TypeTag::Port),
        Field::container("tags", TypeTag::Table, TypeTag::String),
    ]
}

fn conn_record() -> Vec<Value> {
    vec![
        Value::time(1_300_475_167.5),
        Value::string("CXWv6p3arKYeMETxOg"),
        Value::port(5353, TransportProto::Udp),
        Value::set(vec![Value::string("a"), Value::string("b")]),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn every_supported_type_round_trips_through_the_server() {
    init_test_tracing();
    let Some(schema) = TestSchema::spawn().await else {
        return;
    };

    let fields = vec![
        Field::new("flag", TypeTag::Bool),
        Field::new("delta", TypeTag::Int),
        Field::new("bytes", TypeTag::Count),
        Field::new("pkts", TypeTag::Counter),
        Field::new("port", TypeTag::Port),
        Field::new("ratio", TypeTag::Double),
        Field::new("ts", TypeTag::Time),
        Field::new("duration", TypeTag::Interval),
        Field::new("host", TypeTag::Addr),
        Field::new("net", TypeTag::Subnet),
        Field::new("uid", TypeTag::String),
        Field::new("proto", TypeTag::Enum),
        Field::new("fname", TypeTag::File),
        Field::new("callback", TypeTag::Func),
        Field::container("tags", TypeTag::Table, TypeTag::String),
        Field::container("sizes", TypeTag::Vector, TypeTag::Count),
        Field::container("hosts", TypeTag::Table, TypeTag::Addr),
        Field::container("bits", TypeTag::Vector, TypeTag::Bool),
        Field::container("empty_tags", TypeTag::Table, TypeTag::String),
    ];
    let record = vec![
        Value::bool(true),
        Value::int(-42),
        Value::count(42),
        Value::new(TypeTag::Counter, Payload::Count(7)),
        Value::port(443, TransportProto::Tcp),
        Value::double(f64::NAN),
        Value::time(1_300_475_167.5),
        Value::interval(0.25),
        Value::addr(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))),
        Value::subnet(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 8),
        Value::string("alice"),
        Value::enumeration("tcp"),
        Value::new(TypeTag::File, Payload::String(b"conn.log".to_vec())),
        Value::new(TypeTag::Func, Payload::String(b"Conn::log".to_vec())),
        Value::set(vec![
            Value::string("a\"b"),
            Value::string("c\\d"),
            Value::absent(TypeTag::String),
        ]),
        Value::vector(vec![
            Value::count(1),
            Value::absent(TypeTag::Count),
            Value::count(3),
        ]),
        Value::set(vec![Value::addr(IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)))]),
        Value::vector(vec![Value::bool(true), Value::bool(false)]),
        Value::set(vec![]),
    ];

    let mut writer = PostgresWriter::new();
    writer
        .init(&schema.info("everything", &[]), &fields)
        .await
        .unwrap();
    writer.write(&fields, &record).await.unwrap();
    writer
        .write(
            &fields,
            &fields
                .iter()
                .map(|field| Value::absent(field.type_tag))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap();
    writer.finish(0.0).await.unwrap();
    drop(writer);

    let columns = "flag, delta, bytes, pkts, port, ratio, ts, duration, host, net, uid, proto, \
                   fname, callback, tags, sizes, hosts, bits, empty_tags";
    let rows = schema.rows("everything", columns).await;

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        vec![
            text("t"),
            text("-42"),
            text("42"),
            text("7"),
            text("443"),
            text("NaN"),
            text("1300475167.5"),
            text("0.25"),
            text("1.2.3.4"),
            text("10.0.0.0/8"),
            text("alice"),
            text("tcp"),
            text("conn.log"),
            text("Conn::log"),
            text(r#"{"a\"b","c\\d",NULL}"#),
            text("{1,NULL,3}"),
            text("{5.6.7.8}"),
            text("{t,f}"),
            None,
        ]
    );
    assert!(rows[1].iter().all(Option::is_none));

    schema.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn literal_statements_store_the_json_record() {
    init_test_tracing();
    let Some(schema) = TestSchema::spawn().await else {
        return;
    };

    let info = schema.info(
        "conn",
        &[
            ("columns", "id SERIAL, uid text, doc jsonb"),
            ("indexes", "uid, doc"),
            ("values", "$1::jsonb->>'uid', $1::jsonb"),
        ],
    );
    let mut writer = PostgresWriter::new();
    writer.init(&info, &conn_fields()).await.unwrap();
    writer.write(&conn_fields(), &conn_record()).await.unwrap();
    drop(writer);

    let rows = schema
        .rows("conn", "uid, doc->>'port', doc->'tags', doc->>'ts'")
        .await;
    assert_eq!(
        rows,
        vec![vec![
            text("CXWv6p3arKYeMETxOg"),
            text("5353"),
            text(r#"["a", "b"]"#),
            text("1300475167.5"),
        ]]
    );

    schema.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ascii_data_column_stores_one_line_per_record() {
    init_test_tracing();
    let Some(schema) = TestSchema::spawn().await else {
        return;
    };

    let info = schema.info("conn", &[("datacolumn", "line"), ("format", "ascii")]);
    let mut writer = PostgresWriter::new();
    writer.init(&info, &conn_fields()).await.unwrap();
    writer.write(&conn_fields(), &conn_record()).await.unwrap();
    drop(writer);

    let rows = schema.rows("conn", "line").await;
    assert_eq!(
        rows,
        vec![vec![text(
            "1300475167.500000\tCXWv6p3arKYeMETxOg\t5353\ta,b"
        )]]
    );

    schema.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_follow_continue_on_errors() {
    init_test_tracing();
    let Some(schema) = TestSchema::spawn().await else {
        return;
    };

    let fields = vec![Field::new("bytes", TypeTag::Count)];

    let mut strict = PostgresWriter::new();
    strict
        .init(&schema.info("strict", &[]), &fields)
        .await
        .unwrap();
    let err = strict
        .write(&fields, &[Value::count(u64::MAX)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConversionError);
    assert!(
        err.detail()
            .is_some_and(|detail| detail.contains("out of range for type bigint"))
    );
    drop(strict);

    let mut lenient = PostgresWriter::new();
    lenient
        .init(
            &schema.info("lenient", &[("continue_on_errors", "T")]),
            &fields,
        )
        .await
        .unwrap();
    lenient
        .write(&fields, &[Value::count(u64::MAX)])
        .await
        .unwrap();
    lenient.write(&fields, &[Value::count(1)]).await.unwrap();
    drop(lenient);

    assert!(schema.rows("strict", "bytes").await.is_empty());
    assert_eq!(schema.rows("lenient", "bytes").await, vec![vec![text("1")]]);

    schema.cleanup().await;
}
