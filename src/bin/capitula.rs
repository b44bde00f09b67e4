//! Capitula CLI — inspect and edit chapter-grouped orders.
//!
//! Usage:
//!   capitula init-demo [--db path]
//!   capitula show <order> [--db path]
//!   capitula add <order> <chapter> <section> <query> [--db path]
//!   capitula edit <order> <line> [--qty N] [--price N] [--name TEXT]
//!   capitula rm <order> <line> --yes
//!   capitula note <order> <chapter> <section> <text>

use capitula::{
    AlwaysConfirm, ChapterEditor, EditorResult, FirstMatch, LineField, LineId, NeverConfirm,
    ProductQuery, SectionKey, SqliteBackend,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "capitula",
    version,
    about = "Chapter-grouped sales order editing engine"
)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a demo catalog and order to play with
    InitDemo,
    /// Print an order's chapter tree
    Show {
        /// Order id
        order: i64,
    },
    /// Add the first product matching a search to a section
    Add {
        order: i64,
        chapter: String,
        section: String,
        /// Product name search, scoped to the section's category
        query: String,
    },
    /// Edit a line's fields
    Edit {
        order: i64,
        line: i64,
        #[arg(long)]
        qty: Option<f64>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a line
    Rm {
        order: i64,
        line: i64,
        /// Confirm the deletion (without it the command refuses)
        #[arg(long)]
        yes: bool,
    },
    /// Set a section's particular-conditions text
    Note {
        order: i64,
        chapter: String,
        section: String,
        text: String,
    },
    /// List catalog categories
    Categories {
        query: Option<String>,
    },
    /// Search catalog products
    Products {
        query: Option<String>,
        #[arg(long)]
        category: Option<i64>,
    },
}

/// Get the default database path (~/.local/share/capitula/capitula.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("capitula");
    std::fs::create_dir_all(&dir).ok();
    dir.join("capitula.db")
}

fn open_backend(db: Option<PathBuf>) -> Result<Arc<SqliteBackend>, String> {
    let path = db.unwrap_or_else(default_db_path);
    let backend =
        SqliteBackend::open(&path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(backend))
}

async fn open_editor(
    backend: Arc<SqliteBackend>,
    order: i64,
) -> Result<ChapterEditor, String> {
    let editor = ChapterEditor::new(order, backend);
    editor
        .refresh()
        .await
        .map_err(|e| format!("Failed to load order {}: {}", order, e))?;
    Ok(editor)
}

fn cmd_init_demo(backend: &SqliteBackend) -> EditorResult<i64> {
    let electrical = backend.insert_category("Electrical", None)?;
    let civil = backend.insert_category("Civil works", None)?;

    backend.insert_product("Cable 2.5mm", Some("CAB-25"), 1.2, Some(electrical))?;
    backend.insert_product("Switchboard 12M", Some("SWB-12"), 180.0, Some(electrical))?;
    backend.insert_product("LED panel 60x60", None, 35.5, Some(electrical))?;
    backend.insert_product("Concrete m3", Some("CON-01"), 92.0, Some(civil))?;
    backend.insert_product("Rebar 12mm", None, 4.8, Some(civil))?;

    let order = backend.create_order("S00042")?;
    backend.create_chapter(order, "Obra Civil")?;
    backend.create_section(
        order,
        &SectionKey::new("Obra Civil", "Cimentación"),
        Some(civil),
        false,
    )?;
    backend.create_chapter(order, "Electricidad")?;
    backend.create_section(
        order,
        &SectionKey::new("Electricidad", "Instalación"),
        Some(electrical),
        false,
    )?;
    backend.create_section(
        order,
        &SectionKey::new("Electricidad", "Condiciones"),
        None,
        true,
    )?;
    Ok(order)
}

async fn cmd_show(editor: &ChapterEditor) -> i32 {
    let tree = editor.tree();
    if tree.is_empty() {
        println!("Order {} has no chapters", editor.order());
        return 0;
    }
    for chapter in &tree.chapters {
        println!("{}  ({:.2})", chapter.name, chapter.total);
        for section in &chapter.sections {
            let lock = if section.locked { " [locked]" } else { "" };
            println!("  {}{}", section.name, lock);
            for line in &section.lines {
                println!(
                    "    #{:<5} {:<40} {:>8.2} x {:>8.2} = {:>10.2}",
                    line.id, line.name, line.quantity, line.unit_price, line.subtotal
                );
            }
            let key = SectionKey::new(chapter.name.clone(), section.name.clone());
            let conditions = editor.conditions(&key);
            if !conditions.is_empty() {
                println!("    · {}", conditions);
            }
        }
    }
    println!("Total: {:.2}", tree.total());
    0
}

async fn cmd_add(
    backend: Arc<SqliteBackend>,
    editor: ChapterEditor,
    key: SectionKey,
    query: String,
) -> i32 {
    let selection = Arc::new(FirstMatch::new(backend).with_query(query));
    let editor = editor.with_selection(selection);

    match editor.add_line(&key).await {
        Ok(capitula::AddOutcome::Added(line)) => {
            println!("Added line {} to {}", line, key);
            cmd_show(&editor).await
        }
        Ok(capitula::AddOutcome::Cancelled) => {
            eprintln!("No product matched the search");
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_edit(
    editor: &ChapterEditor,
    line: LineId,
    qty: Option<f64>,
    price: Option<f64>,
    name: Option<String>,
) -> i32 {
    if qty.is_none() && price.is_none() && name.is_none() {
        eprintln!("Nothing to change: pass --qty, --price or --name");
        return 1;
    }
    if let Some(qty) = qty {
        editor.stage_field(line, LineField::Quantity, qty.to_string());
    }
    if let Some(price) = price {
        editor.stage_field(line, LineField::UnitPrice, price.to_string());
    }
    if let Some(name) = name {
        editor.stage_field(line, LineField::Name, name);
    }

    match editor.edit_line(line).await {
        Ok(()) => {
            println!("Updated line {}", line);
            cmd_show(editor).await
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_rm(editor: ChapterEditor, line: LineId, yes: bool) -> i32 {
    let editor = if yes {
        editor.with_confirmation(Arc::new(AlwaysConfirm))
    } else {
        editor.with_confirmation(Arc::new(NeverConfirm))
    };

    match editor.delete_line(line).await {
        Ok(capitula::DeleteOutcome::Deleted) => {
            println!("Deleted line {}", line);
            0
        }
        Ok(capitula::DeleteOutcome::Cancelled) => {
            eprintln!("Refusing to delete without --yes");
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_note(editor: &ChapterEditor, key: SectionKey, text: String) -> i32 {
    match editor.set_conditions(&key, text).await {
        Ok(()) => {
            println!("Updated conditions for {}", key);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_categories(backend: &SqliteBackend, query: Option<String>) -> i32 {
    use capitula::CatalogSearch;
    match backend.search_categories(query.as_deref()).await {
        Ok(categories) => {
            for category in categories {
                println!(
                    "{:<5} {:<30} {} products",
                    category.id, category.name, category.product_count
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_products(
    backend: &SqliteBackend,
    query: Option<String>,
    category: Option<i64>,
) -> i32 {
    use capitula::CatalogSearch;
    let mut filter = ProductQuery::new();
    if let Some(query) = query {
        filter = filter.with_name(query);
    }
    if let Some(category) = category {
        filter = filter.with_category(category);
    }
    match backend.search_products(&filter).await {
        Ok(products) => {
            for product in products {
                let code = product.code.unwrap_or_default();
                println!(
                    "{:<5} {:<10} {:<40} {:>8.2}",
                    product.id, code, product.name, product.list_price
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let backend = match open_backend(cli.db) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::InitDemo => match cmd_init_demo(&backend) {
            Ok(order) => {
                println!("Created demo order {}", order);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Show { order } => match open_editor(backend.clone(), order).await {
            Ok(editor) => cmd_show(&editor).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Add {
            order,
            chapter,
            section,
            query,
        } => match open_editor(backend.clone(), order).await {
            Ok(editor) => {
                cmd_add(backend, editor, SectionKey::new(chapter, section), query).await
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Edit {
            order,
            line,
            qty,
            price,
            name,
        } => match open_editor(backend.clone(), order).await {
            Ok(editor) => cmd_edit(&editor, LineId::new(line), qty, price, name).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Rm { order, line, yes } => match open_editor(backend.clone(), order).await {
            Ok(editor) => cmd_rm(editor, LineId::new(line), yes).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Note {
            order,
            chapter,
            section,
            text,
        } => match open_editor(backend.clone(), order).await {
            Ok(editor) => cmd_note(&editor, SectionKey::new(chapter, section), text).await,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Categories { query } => cmd_categories(&backend, query).await,
        Commands::Products { query, category } => cmd_products(&backend, query, category).await,
    };

    std::process::exit(code);
}
