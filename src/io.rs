// src/io.rs
//
// JSON dumps of level fields, for inspecting solver state from scripts.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::amr::layout::PatchLayout;
use crate::amr::level_data::LevelData;
use crate::amr::rect::Rect2i;

#[derive(Debug, Serialize, Deserialize)]
struct PatchDump {
    valid: Rect2i,
    /// One row-major (i fastest) array of valid values per component.
    components: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LevelDump {
    dx: f64,
    ncomp: usize,
    ghost: usize,
    patches: Vec<PatchDump>,
}

/// Write the valid data of `field` to `path` as pretty JSON.
pub fn write_level_data(path: &Path, field: &LevelData, dx: f64) -> std::io::Result<()> {
    let patches = field
        .patches()
        .iter()
        .map(|p| PatchDump {
            valid: p.valid,
            components: (0..p.ncomp)
                .map(|c| p.valid.cells().map(|(i, j)| p.get(i, j, c)).collect())
                .collect(),
        })
        .collect();
    let dump = LevelDump {
        dx,
        ncomp: field.ncomp(),
        ghost: field.ghost(),
        patches,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(w, &dump)?;
    log::debug!("[helmholtz] wrote {} patches to {}", field.patches().len(), path.display());
    Ok(())
}

/// Read a dump written by [`write_level_data`]; ghosts come back zeroed.
/// Returns the field and its cell size.
pub fn read_level_data(path: &Path) -> std::io::Result<(LevelData, f64)> {
    let r = BufReader::new(File::open(path)?);
    let dump: LevelDump = serde_json::from_reader(r)?;

    let layout = Arc::new(PatchLayout::new(dump.patches.iter().map(|p| p.valid).collect()));
    let mut field = LevelData::new(layout, dump.ncomp, dump.ghost);
    for (p, d) in field.patches_mut().iter_mut().zip(&dump.patches) {
        if d.components.len() != dump.ncomp {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("patch {:?}: {} components, header says {}", d.valid, d.components.len(), dump.ncomp),
            ));
        }
        for (c, values) in d.components.iter().enumerate() {
            if values.len() != d.valid.n_cells() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("patch {:?}: {} values for {} cells", d.valid, values.len(), d.valid.n_cells()),
                ));
            }
            for ((i, j), v) in d.valid.cells().zip(values) {
                p.set(i, j, c, *v);
            }
        }
    }
    Ok((field, dump.dx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_preserves_valid_data() {
        let layout = Arc::new(PatchLayout::new(vec![Rect2i::new(0, 0, 3, 2), Rect2i::new(3, 0, 2, 2)]));
        let mut f = LevelData::new(layout, 2, 1);
        f.fill_valid_with(|i, j, c| (i - 2 * j) as f64 + 0.5 * c as f64);

        let dir = std::env::temp_dir().join(format!("helmholtz_io_{}", std::process::id()));
        let path = dir.join("phi.json");
        write_level_data(&path, &f, 0.25).unwrap();
        let (g, dx) = read_level_data(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(dx, 0.25);
        assert_eq!(g.layout(), f.layout());
        assert_eq!(g.ghost(), 1);
        assert_eq!(g.value_at(4, 1, 1), f.value_at(4, 1, 1));
        let mut diff = LevelData::new_like(&f);
        diff.axby(&f, &g, 1.0, -1.0);
        assert_eq!(diff.max_norm(), 0.0);
    }

    #[test]
    fn component_count_must_match_the_header() {
        let dir = std::env::temp_dir().join(format!("helmholtz_io_ncomp_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("phi.json");

        let valid = Rect2i::new(0, 0, 2, 1);
        let mut results = Vec::new();
        for components in [vec![vec![1.0, 2.0], vec![3.0, 4.0]], vec![]] {
            let dump = LevelDump {
                dx: 0.5,
                ncomp: 1,
                ghost: 1,
                patches: vec![PatchDump { valid, components }],
            };
            serde_json::to_writer(File::create(&path).unwrap(), &dump).unwrap();
            results.push(read_level_data(&path));
        }
        let _ = std::fs::remove_dir_all(&dir);

        for r in results {
            let err = r.err().map(|e| e.kind());
            assert_eq!(err, Some(std::io::ErrorKind::InvalidData));
        }
    }
}
