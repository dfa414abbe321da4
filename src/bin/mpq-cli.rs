//! mpq-cli - Command-line interface for mpqkit
//!
//! A command-line tool for inspecting MPQ archives, extracting files from
//! them and decoding DCC sprites.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mpqkit::{Archive, DccFile};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "mpq-cli")]
#[command(about = "A CLI tool for reading MPQ archives and the files inside them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the archive header and table sizes
    Info {
        /// Archive to analyze
        archive: PathBuf,
    },

    /// List the files named by the archive's listfile
    List {
        /// Archive to list
        archive: PathBuf,

        /// Additional listfile with one name per line
        #[arg(short, long)]
        listfile: Option<PathBuf>,
    },

    /// Extract one file
    Extract {
        /// Archive to read from
        archive: PathBuf,

        /// Path of the file inside the archive
        name: String,

        /// Output file
        output: PathBuf,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Extract every listed file into a directory
    ExtractAll {
        /// Archive to read from
        archive: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Additional listfile with one name per line
        #[arg(short, long)]
        listfile: Option<PathBuf>,

        /// Force overwrite of existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Decode a DCC sprite and describe its frames
    Dcc {
        /// DCC file on disk, or a path inside `--archive`
        input: String,

        /// Read the sprite from this archive
        #[arg(short, long)]
        archive: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { archive } => show_archive_info(&archive, cli.verbose),
        Commands::List { archive, listfile } => {
            list_files(&archive, listfile.as_deref(), cli.verbose)
        }
        Commands::Extract {
            archive,
            name,
            output,
            force,
        } => extract_file(&archive, &name, &output, force, cli.verbose, cli.quiet),
        Commands::ExtractAll {
            archive,
            output,
            listfile,
            force,
        } => extract_all(
            &archive,
            &output,
            listfile.as_deref(),
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Dcc { input, archive } => show_dcc_info(&input, archive.as_deref(), cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn open_archive(path: &Path) -> Result<Archive, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Archive '{}' does not exist", path.display()).into());
    }
    Ok(Archive::open(path)?)
}

/// Names from the archive's listfile followed by those of an external one
fn collect_names(
    archive: &Archive,
    listfile: Option<&Path>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut names = archive.file_names()?;
    if let Some(path) = listfile {
        let text = fs::read_to_string(path)?;
        names.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    names.sort_by_key(|name| name.to_ascii_lowercase());
    names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    Ok(names)
}

fn show_archive_info(path: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let archive = open_archive(path)?;
    let header = archive.header();

    println!("MPQ Archive Information:");
    println!("  File: {}", path.display());
    println!("  Archive Size: {} bytes", header.archive_size);
    println!("  Format Version: {}", header.format_version);
    println!(
        "  Sector Size: {} bytes (shift {})",
        header.sector_size(),
        header.sector_size_shift
    );
    println!(
        "  Hash Table: {} entries at 0x{:08X}",
        header.hash_table_entries, header.hash_table_pos
    );
    println!(
        "  Block Table: {} entries at 0x{:08X}",
        header.block_table_entries, header.block_table_pos
    );

    let used = archive
        .hash_records()
        .iter()
        .filter(|record| record.is_valid())
        .count();
    println!("  Used Hash Slots: {}", used);

    match archive.file_names() {
        Ok(names) if names.is_empty() => println!("  Listfile: none"),
        Ok(names) => println!("  Listfile: {} names", names.len()),
        Err(e) => println!("  Listfile: ✗ unreadable ({})", e),
    }

    if verbose {
        for (index, block) in archive.block_records().iter().enumerate() {
            println!(
                "  Block {:5}: offset 0x{:08X}, {} -> {} bytes, {:?}",
                index, block.offset, block.compressed_size, block.file_size, block.flags
            );
        }
    }

    Ok(())
}

fn list_files(
    path: &Path,
    listfile: Option<&Path>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let archive = open_archive(path)?;

    for name in collect_names(&archive, listfile)? {
        match archive.lookup(&name) {
            Ok(block) if verbose => println!(
                "{:>10} {:>10}  {:?}  {}",
                block.file_size, block.compressed_size, block.flags, name
            ),
            Ok(block) => println!("{:>10}  {}", block.file_size, name),
            Err(_) if verbose => println!("{:>10}  {} (not in archive)", "-", name),
            Err(_) => {}
        }
    }

    Ok(())
}

fn extract_file(
    path: &Path,
    name: &str,
    output: &Path,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check if output file exists and force flag
    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }

    let archive = open_archive(path)?;
    if verbose {
        let block = archive.lookup(name)?;
        println!("Extracting '{}' to '{}'", name, output.display());
        println!(
            "Stored: {} bytes, Size: {} bytes, Flags: {:?}",
            block.compressed_size, block.file_size, block.flags
        );
    }

    let start_time = Instant::now();
    let data = archive
        .read_file(name)
        .map_err(|e| format!("Extraction of '{}' failed: {}", name, e))?;
    fs::write(output, &data)?;

    if !quiet {
        println!("✓ Extraction successful!");
        println!("  Output: {} bytes", data.len());
        println!("  Time:   {:.2?}", start_time.elapsed());
    }

    Ok(())
}

/// Output path for an archive name, with `\` separators turned into
/// directories
fn output_path(root: &Path, name: &str) -> PathBuf {
    name.split(['\\', '/'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

fn extract_all(
    path: &Path,
    output: &Path,
    listfile: Option<&Path>,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let archive = open_archive(path)?;
    let names: Vec<String> = collect_names(&archive, listfile)?
        .into_iter()
        .filter(|name| archive.has_file(name))
        .collect();

    let progress = if !quiet {
        let pb = ProgressBar::new(names.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start_time = Instant::now();
    let mut extracted = 0;
    let mut failed = 0;

    for name in &names {
        let target = output_path(output, name);
        if target.exists() && !force {
            if verbose {
                println!("Skipping '{}': output exists", name);
            }
        } else {
            match archive.read_file(name) {
                Ok(data) => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&target, &data)?;
                    extracted += 1;
                }
                Err(e) => {
                    failed += 1;
                    if verbose {
                        println!("✗ {}: {}", name, e);
                    }
                }
            }
        }

        if let Some(ref pb) = progress {
            pb.set_message(name.clone());
            pb.inc(1);
        }
    }

    if let Some(ref pb) = progress {
        pb.finish_with_message("Extraction complete");
    }

    if !quiet {
        println!("✓ Extracted {} of {} files", extracted, names.len());
        if failed > 0 {
            println!("  Failed: {}", failed);
        }
        println!("  Time:   {:.2?}", start_time.elapsed());
    }

    Ok(())
}

fn show_dcc_info(
    input: &str,
    archive: Option<&Path>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = match archive {
        Some(path) => open_archive(path)?.read_file(input)?,
        None => fs::read(input)?,
    };

    let dcc = DccFile::parse(&data)?;
    println!("DCC File Information:");
    println!("  File: {}", input);
    println!("  Version: {}", dcc.version());
    println!("  Directions: {}", dcc.direction_count());
    println!("  Frames per Direction: {}", dcc.frames_per_direction());

    for index in 0..dcc.direction_count() {
        match dcc.direction(index) {
            Ok(direction) => {
                let bounds = direction.bounds;
                println!(
                    "  Direction {:2}: {}x{} at ({}, {}), {} frames",
                    index,
                    bounds.width,
                    bounds.height,
                    bounds.left,
                    bounds.top,
                    direction.frame_count()
                );
                if verbose {
                    for (i, frame) in direction.frames.iter().enumerate() {
                        let opaque = frame.pixels().iter().filter(|&&p| p != 0).count();
                        println!(
                            "    Frame {:2}: {}x{} at ({}, {}), {} opaque pixels",
                            i,
                            frame.header.width,
                            frame.header.height,
                            frame.header.x_offset,
                            frame.header.y_offset,
                            opaque
                        );
                    }
                }
            }
            Err(e) => println!("  Direction {:2}: ✗ {}", index, e),
        }
    }

    Ok(())
}
