use std::{io::Cursor, ops::ControlFlow};

use metawalk::{bbox, exif, heif, jpeg, ByteCursor, Flow};
use tracing_subscriber::EnvFilter;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    afl::fuzz!(|data: &[u8]| {
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = jpeg::parse_with_scan(&mut c, |_, _| Ok(Flow::Skip));
        }
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = jpeg::parse_exif(&mut c, |_| ControlFlow::Continue(()));
        }
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = exif::read_ifds(&mut c);
        }
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = heif::parse_exif(&mut c, |e| {
                let _ = e.decode();
                ControlFlow::Continue(())
            });
        }

        let mut c = ByteCursor::unseekable(data);
        let _ = bbox::parse(&mut c, |_, _| Ok(Flow::Skip));
    });
}
