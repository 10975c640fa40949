#![allow(missing_docs)]

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use kvgraph::connection::{decode_cursor, encode_cursor, slice_edges};
use kvgraph::{
    ChunkedKv, Config, Data, DataKind, DataTypeRegistry, Edge, GraphStore, MemoryKv, Node,
    NodeLoader, RangeField,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "kvgraph",
    version,
    about = "Graph storage on a wide-column key-value store",
    disable_help_subcommand = true
)]
struct Cli {
    /// Optional TOML config file.
    #[arg(long, global = true, env = "KVGRAPH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Builds a small home network in memory and prints each step as JSON.
    Demo {
        /// Page size used when listing the router's connections.
        #[arg(long, default_value_t = 2)]
        page_size: usize,
    },
    /// Encode or decode record sort keys.
    #[command(subcommand)]
    Range(RangeCommand),
    /// Encode or decode connection cursors.
    #[command(subcommand)]
    Cursor(CursorCommand),
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Subcommand, Debug)]
enum RangeCommand {
    /// Encodes a sort key from its kind and fields.
    Encode {
        #[arg(value_enum)]
        kind: RangeKind,
        /// Node ID for edge kinds, then the data type for data kinds.
        fields: Vec<String>,
    },
    /// Decodes a sort key and prints its fields as JSON.
    Decode { key: String },
}

#[derive(Subcommand, Debug)]
enum CursorCommand {
    Encode { id: String },
    Decode { cursor: String },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum RangeKind {
    Node,
    NodeData,
    Child,
    ChildData,
    Parent,
    ParentData,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.log_filter);

    match cli.command {
        Command::Demo { page_size } => demo(&config, page_size)?,
        Command::Range(RangeCommand::Encode { kind, fields }) => {
            println!("{}", range_from_args(kind, fields)?.encode());
        }
        Command::Range(RangeCommand::Decode { key }) => {
            let field: RangeField = key.parse()?;
            println!("{}", serde_json::to_string_pretty(&range_to_json(&field))?);
        }
        Command::Cursor(CursorCommand::Encode { id }) => println!("{}", encode_cursor(&id)),
        Command::Cursor(CursorCommand::Decode { cursor }) => println!("{}", decode_cursor(&cursor)?),
        Command::Config => print!("{}", config.to_toml()?),
    }
    Ok(())
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn range_from_args(kind: RangeKind, fields: Vec<String>) -> Result<RangeField, Box<dyn Error>> {
    let expected = match kind {
        RangeKind::Node => 0,
        RangeKind::NodeData | RangeKind::Child | RangeKind::Parent => 1,
        RangeKind::ChildData | RangeKind::ParentData => 2,
    };
    if fields.len() != expected {
        return Err(format!("{kind:?} takes {expected} field(s), got {}", fields.len()).into());
    }
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    Ok(match kind {
        RangeKind::Node => RangeField::Node,
        RangeKind::NodeData => RangeField::NodeData { data_type: next() },
        RangeKind::Child => RangeField::Child { child: next() },
        RangeKind::ChildData => RangeField::ChildData {
            child: next(),
            data_type: next(),
        },
        RangeKind::Parent => RangeField::Parent { parent: next() },
        RangeKind::ParentData => RangeField::ParentData {
            parent: next(),
            data_type: next(),
        },
    })
}

fn range_to_json(field: &RangeField) -> serde_json::Value {
    match field {
        RangeField::Node => json!({ "kind": "node" }),
        RangeField::NodeData { data_type } => json!({ "kind": "node-data", "dataType": data_type }),
        RangeField::Child { child } => json!({ "kind": "child", "child": child }),
        RangeField::ChildData { child, data_type } => {
            json!({ "kind": "child-data", "child": child, "dataType": data_type })
        }
        RangeField::Parent { parent } => json!({ "kind": "parent", "parent": parent }),
        RangeField::ParentData { parent, data_type } => {
            json!({ "kind": "parent-data", "parent": parent, "dataType": data_type })
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Computer {
    brand: String,
    #[serde(rename = "yearPurchased")]
    year_purchased: i32,
}

impl DataKind for Computer {
    const DATA_TYPE: &'static str = "computer";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Router {
    ssid: String,
}

impl DataKind for Router {
    const DATA_TYPE: &'static str = "router";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Connection {
    #[serde(rename = "connectionType")]
    kind: String,
}

impl DataKind for Connection {
    const DATA_TYPE: &'static str = "connection";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Location {
    lng: f64,
    lat: f64,
}

impl DataKind for Location {
    const DATA_TYPE: &'static str = "Location";
}

fn connection(kind: &str) -> Connection {
    Connection { kind: kind.into() }
}

type DemoStore = GraphStore<ChunkedKv<MemoryKv>>;

fn demo(config: &Config, page_size: usize) -> Result<(), Box<dyn Error>> {
    let mut registry = DataTypeRegistry::new();
    registry
        .register::<Computer>()
        .register::<Router>()
        .register::<Connection>()
        .register::<Location>();
    let client = ChunkedKv::with_chunk_size(MemoryKv::new(), config.store.chunk_size);
    let store: Arc<DemoStore> = Arc::new(GraphStore::with_registry(client, registry));

    info!("creating computer node");
    store.put(&[Node::new("adrian's mac").with_data(Computer {
        brand: "Apple".into(),
        year_purchased: 2015,
    })])?;

    info!("creating router node");
    store.put(&[Node::new("router")
        .with_data(Router {
            ssid: "VM675321".into(),
        })
        .with_data(Location {
            lat: 48.864716,
            lng: 2.349014,
        })
        .with_children([Edge::new("adrian's mac").with_data(connection("wifi"))])])?;
    print_node(&store, "router")?;

    info!("creating ps4 and connecting it");
    store.put(&[Node::new("ps4").with_data(Computer::default())])?;
    store.put_edges("router", &[Edge::new("ps4").with_data(connection("wireless"))])?;
    store.put_edge_data("router", "ps4", Data::of(connection("ethernet")))?;

    info!("creating and deleting wii");
    store.put(&[Node::new("wii").with_data(Computer::default())])?;
    store.put_edges("router", &[Edge::new("wii").with_data(connection("wifi"))])?;
    store.delete("wii")?;

    if let Some(router) = store.get("router")? {
        if let Some(r) = router.data.get::<Router>() {
            println!("SSID of router: {}", r.ssid);
        }
        print_connections(Arc::clone(&store), config, &router, page_size)?;
    }

    print_node(&store, "ps4")?;
    info!("disconnecting ps4");
    store.delete_edge("router", "ps4")?;
    print_node(&store, "ps4")?;

    info!("moving router to London");
    store.put_node_data(
        "router",
        &Data::of(Location {
            lat: 51.509865,
            lng: -0.118092,
        }),
    )?;
    print_node(&store, "router")?;

    let capacity = store.capacity();
    println!(
        "Capacity units consumed - total: {}, read: {}, write: {}",
        capacity.total, capacity.read, capacity.write
    );
    Ok(())
}

fn print_node(store: &DemoStore, id: &str) -> Result<(), Box<dyn Error>> {
    match store.get(id)? {
        Some(node) => println!("{}", serde_json::to_string(&node)?),
        None => println!("{id}: not found"),
    }
    Ok(())
}

/// Pages through a node's children, resolving each page with one loader.
fn print_connections(
    store: Arc<DemoStore>,
    config: &Config,
    router: &Node,
    page_size: usize,
) -> Result<(), Box<dyn Error>> {
    let loader = NodeLoader::new(store, config.loader_config());
    let mut after: Option<String> = None;
    loop {
        let (page, info) = slice_edges(&router.children, page_size, after.as_deref());
        let ids: Vec<&str> = page.iter().map(|e| e.id.as_str()).collect();
        let (nodes, errs) = loader.load_all(&ids);
        if let Some(err) = errs.into_iter().flatten().next() {
            return Err(err.into());
        }
        let page_json: Vec<_> = page
            .iter()
            .zip(nodes)
            .map(|(edge, node)| json!({ "edge": edge, "node": node.as_deref() }))
            .collect();
        println!(
            "{}",
            serde_json::to_string(&json!({ "edges": page_json, "pageInfo": info }))?
        );
        if !info.has_next_page {
            break;
        }
        after = info.end_cursor;
    }
    let stats = loader.finish();
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
