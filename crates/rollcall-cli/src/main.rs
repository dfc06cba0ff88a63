use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::roster::RosterError;
use rollcall_core::{enroll, recognize, Annotator, OnnxFaceEngine, RosterStore};

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall roster and attendance administration")]
struct Cli {
    /// Roster backing file (default: $ROLLCALL_ROSTER_PATH)
    #[arg(long, global = true)]
    roster: Option<PathBuf>,
    /// Directory containing the ONNX model files (default: $ROLLCALL_MODEL_DIR)
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student from a photo
    Enroll {
        /// Student identifier (e.g. "S1024")
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Re-enroll in place, keeping the slot of the existing record
        #[arg(long)]
        update: bool,
        /// Path to the enrollment photo
        image: PathBuf,
    },
    /// List enrolled students
    List,
    /// Remove a student by identifier
    Remove {
        /// Student identifier to remove
        id: String,
    },
    /// Recognize the faces in a photo against the roster
    Recognize {
        /// Path to the probe photo
        image: PathBuf,
        /// Match tolerance (default: $ROLLCALL_TOLERANCE or 0.5)
        #[arg(long)]
        tolerance: Option<f32>,
        /// Write the annotated image to this path
        #[arg(long)]
        output: Option<PathBuf>,
        /// TTF font for annotation (default: $ROLLCALL_FONT_PATH)
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Rebuild the roster from a directory of "ID_Name.jpg" photos
    Rebuild {
        /// Photo directory (default: $ROLLCALL_DATASET_DIR)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Show attendance records
    Attendance {
        /// SQLite attendance database (default: $ROLLCALL_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        student_id: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = RosterStore::new(resolve(cli.roster, "ROLLCALL_ROSTER_PATH", "roster.bin"));
    let model_dir = resolve(cli.models, "ROLLCALL_MODEL_DIR", "models");

    match cli.command {
        Commands::Enroll { id, name, update, image } => {
            let old_slot = if update {
                match store.lookup_by_external_id(&id)? {
                    Some((slot, _)) => Some(slot),
                    None => anyhow::bail!("no enrolled student with id {id}"),
                }
            } else {
                None
            };
            let photo = load_photo(&image)?;
            let mut engine = OnnxFaceEngine::load(&model_dir)?;
            let slot = enroll(&store, &mut engine, &id, &name, &photo, old_slot)?;
            println!("Enrolled {name} ({id}) at slot {slot}");
        }
        Commands::List => match store.load() {
            Ok(roster) => {
                if roster.is_empty() {
                    println!("No students enrolled");
                }
                for (slot, record) in &roster {
                    println!("{:>4}  {}  {}", slot, record.external_id, record.display_name);
                }
            }
            Err(RosterError::StoreNotFound(_)) => println!("No students enrolled"),
            Err(err) => return Err(err.into()),
        },
        Commands::Remove { id } => {
            store.delete_by_external_id(&id)?;
            println!("Removed {id}");
        }
        Commands::Recognize { image, tolerance, output, font } => {
            let mut photo = load_photo(&image)?;
            let mut engine = OnnxFaceEngine::load(&model_dir)?;
            let annotator =
                Annotator::load(&resolve(font, "ROLLCALL_FONT_PATH", "DejaVuSans.ttf"))?;
            let roster = store.load()?;
            let tolerance = tolerance.unwrap_or_else(default_tolerance);

            let outcome = recognize(&mut engine, &annotator, &roster, &mut photo, tolerance)?;
            if outcome.is_unknown() {
                println!("No enrolled student recognized");
            } else {
                println!("Recognized {} ({})", outcome.display_name, outcome.external_id);
            }
            if let Some(path) = output {
                photo
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Annotated image written to {}", path.display());
            }
        }
        Commands::Rebuild { dataset } => {
            let dataset = resolve(dataset, "ROLLCALL_DATASET_DIR", "dataset");
            let mut engine = OnnxFaceEngine::load(&model_dir)?;
            let count = store.rebuild_from_directory(&dataset, &mut engine)?;
            println!("Rebuilt roster with {count} students");
        }
        Commands::Attendance { db, start_date, end_date, student_id, status } => {
            let db = resolve(db, "ROLLCALL_DB_PATH", "attendance.db");
            print_attendance(&db, start_date, end_date, student_id, status)?;
        }
    }

    Ok(())
}

/// Flag value, then environment variable, then a file name under the
/// rollcall data directory.
fn resolve(flag: Option<PathBuf>, env_key: &str, default_name: &str) -> PathBuf {
    flag.or_else(|| std::env::var(env_key).map(PathBuf::from).ok())
        .unwrap_or_else(|| data_dir().join(default_name))
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

fn default_tolerance() -> f32 {
    std::env::var("ROLLCALL_TOLERANCE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.5)
}

fn load_photo(path: &PathBuf) -> Result<image::RgbImage> {
    let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(img.to_rgb8())
}

/// Read-only attendance listing, newest first, matching the daemon's
/// filter semantics.
fn print_attendance(
    db: &PathBuf,
    start_date: Option<String>,
    end_date: Option<String>,
    student_id: Option<String>,
    status: Option<String>,
) -> Result<()> {
    let conn = rusqlite::Connection::open_with_flags(
        db,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .with_context(|| format!("failed to open {}", db.display()))?;

    let mut sql =
        String::from("SELECT student_id, student_name, timestamp, status FROM attendance");
    let mut conditions: Vec<&str> = Vec::new();
    let mut params: Vec<&str> = Vec::new();
    if let Some(start) = &start_date {
        conditions.push("DATE(timestamp) >= ?");
        params.push(start);
    }
    if let Some(end) = &end_date {
        conditions.push("DATE(timestamp) <= ?");
        params.push(end);
    }
    if let Some(id) = &student_id {
        conditions.push("student_id = ?");
        params.push(id);
    }
    if let Some(status) = &status {
        conditions.push("status = ?");
        params.push(status);
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY timestamp DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut count = 0usize;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let timestamp: String = row.get(2)?;
        let row_status: String = row.get(3)?;
        println!("{timestamp}  {row_status:<8}  {id}  {name}");
        count += 1;
    }
    if count == 0 {
        println!("No attendance records");
    }
    Ok(())
}
