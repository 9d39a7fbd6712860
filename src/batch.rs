//! Opening several archives at once.
//!
//! Distinct archives share no state, so with the `parallel` feature the
//! opens run on rayon's pool.  Without it they run one after another; the
//! results are identical and always in input order.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::archive::{Archive, ReadOptions};
use crate::error::Result;

/// Outcome of opening one path.
#[derive(Debug)]
pub struct Opened {
    pub path:    PathBuf,
    pub archive: Result<Archive<BufReader<File>>>,
}

/// Open every path with the same options.  A failure on one path does not
/// affect the others.
pub fn open_all<P: AsRef<Path> + Sync>(paths: &[P], options: &ReadOptions) -> Vec<Opened> {
    let open_one = |p: &P| {
        let path = p.as_ref().to_path_buf();
        let archive = Archive::open(&path, options.clone());
        Opened { path, archive }
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        paths.par_iter().map(open_one).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        paths.iter().map(open_one).collect()
    }
}

/// As [`open_all`], but fail on the first path that cannot be opened.
pub fn open_all_strict<P: AsRef<Path> + Sync>(paths: &[P], options: &ReadOptions) -> Result<Vec<Archive>> {
    open_all(paths, options).into_iter().map(|o| o.archive).collect()
}
