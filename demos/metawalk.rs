use std::{
    error::Error,
    ffi::OsStr,
    fs::File,
    io::BufReader,
    ops::ControlFlow,
    path::PathBuf,
};

use clap::Parser;
use metawalk::{bbox, exif, heif, jpeg, ByteCursor, FieldEntry, Flow};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    file: PathBuf,

    /// Only print the file structure (markers or boxes), no Exif fields.
    #[arg(long)]
    structure_only: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(extension) = cli.file.extension().and_then(OsStr::to_str) else {
        println!("Unknown filetype: {}", cli.file.display());
        return Ok(());
    };

    let mut cursor = ByteCursor::seekable(BufReader::new(File::open(&cli.file)?))?;

    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => {
            jpeg::parse(&mut cursor, |_, segment| {
                println!("{:<12} size {}", segment.code.to_string(), segment.size);
                Ok(Flow::Skip)
            })?;
            if !cli.structure_only {
                cursor.seek_absolute(0)?;
                jpeg::parse_exif(&mut cursor, print_entry)?;
            }
        }
        "tif" | "tiff" | "nef" | "nrw" => {
            for ifd in exif::read_ifds(&mut cursor)? {
                println!("IFD{} ({} entries)", ifd.index, ifd.entries.len());
                if !cli.structure_only {
                    ifd.entries.into_iter().for_each(|e| {
                        let _ = print_entry(e);
                    });
                }
            }
        }
        "heic" | "heif" | "avif" => {
            bbox::parse(&mut cursor, |_, header| {
                println!("{:<6} data {}", header.box_type, header.data_size);
                Ok(Flow::Skip)
            })?;
            if !cli.structure_only {
                cursor.seek_absolute(0)?;
                let meta = heif::parse_exif(&mut cursor, print_entry)?;
                if let Some(ftyp) = meta.ftyp {
                    println!("{:<32}=> {}", "major brand", ftyp.major_brand);
                }
            }
        }
        other => println!("Unsupported filetype: {other}"),
    }

    Ok(())
}

fn print_entry(entry: FieldEntry) -> ControlFlow<()> {
    let name = match entry.exif_tag() {
        Some(tag) => tag.to_string(),
        None => format!("0x{:04x}", entry.tag),
    };
    let value = match entry.decode() {
        Ok(v) => v.to_string(),
        Err(e) => format!("<{e}>"),
    };
    println!("{:<32}=> {}", format!("IFD{}.{name}", entry.ifd_index), value);
    ControlFlow::Continue(())
}
