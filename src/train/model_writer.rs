use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::atom::Atom;
use crate::indexer::FeatureIndexer;
use crate::model::{ModelFlags, ATOM_INT, ATOM_LABEL, ATOM_STR, HEADER_SIZE, MAGIC, VERSION};
use crate::weight::WeightVector;

fn to_u32(n: u64, what: &str) -> io::Result<u32> {
    u32::try_from(n).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} exceeds u32::MAX", what),
        )
    })
}

/// Shared atom table: each distinct atom is written once
struct AtomTable<'a> {
    atoms: Vec<&'a Atom>,
    index: HashMap<&'a Atom, u32>,
}

impl<'a> AtomTable<'a> {
    fn from_indexer(indexer: &'a FeatureIndexer) -> io::Result<Self> {
        let mut table = Self {
            atoms: Vec::new(),
            index: HashMap::new(),
        };
        for (_, key) in indexer.iter() {
            for atom in key.atoms() {
                if !table.index.contains_key(atom) {
                    let aid = to_u32(table.atoms.len() as u64, "number of atoms")?;
                    table.index.insert(atom, aid);
                    table.atoms.push(atom);
                }
            }
        }
        Ok(table)
    }

    fn get(&self, atom: &Atom) -> u32 {
        self.index[atom]
    }
}

/// Write a feature indexer and its weights to a model file
///
/// ```no_run
/// use loglin::train::ModelWriter;
/// use loglin::{FeatureIndexer, WeightVector};
/// use std::path::Path;
///
/// let mut indexer = FeatureIndexer::new();
/// let mut weights = WeightVector::new();
/// weights.set(indexer.get_id(("w=the", "DET")), 1.5);
/// ModelWriter::new().write(Path::new("model.bin"), &indexer, &weights).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ModelWriter {
    flags: ModelFlags,
}

impl Default for ModelWriter {
    fn default() -> Self {
        Self {
            flags: ModelFlags::LOCKED | ModelFlags::HASHES,
        }
    }
}

impl ModelWriter {
    /// Writer that locks the indexer on reload and stores key hashes
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the reloaded indexer starts locked
    pub fn locked(mut self, locked: bool) -> Self {
        self.flags.set(ModelFlags::LOCKED, locked);
        self
    }

    /// Whether cached key hashes are stored; otherwise they are recomputed
    /// on reload
    pub fn with_hashes(mut self, hashes: bool) -> Self {
        self.flags.set(ModelFlags::HASHES, hashes);
        self
    }

    /// Write model to file
    pub fn write(
        &self,
        filename: &Path,
        indexer: &FeatureIndexer,
        weights: &WeightVector,
    ) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(filename)?);
        self.write_to(&mut file, indexer, weights)?;
        file.flush()?;
        info!(path = %filename.display(), "model written");
        Ok(())
    }

    /// Write model to any seekable writer
    pub fn write_to<W: Write + Seek>(
        &self,
        w: &mut W,
        indexer: &FeatureIndexer,
        weights: &WeightVector,
    ) -> io::Result<()> {
        let start = w.stream_position()?;
        let table = AtomTable::from_indexer(indexer)?;
        let num_atoms = to_u32(table.atoms.len() as u64, "number of atoms")?;
        let num_keys = to_u32(indexer.len() as u64, "number of keys")?;
        let num_weights = to_u32(weights.len() as u64, "number of weights")?;

        // Placeholder header, patched once the offsets are known
        w.write_all(&[0u8; HEADER_SIZE])?;

        let off_atoms = to_u32(w.stream_position()? - start, "atom section offset")?;
        for atom in &table.atoms {
            Self::write_atom(w, atom)?;
        }

        let off_keys = to_u32(w.stream_position()? - start, "key section offset")?;
        for (_, key) in indexer.iter() {
            // arity is at most MAX_ARITY
            w.write_all(&[key.len() as u8])?;
            for atom in key.atoms() {
                w.write_all(&table.get(atom).to_le_bytes())?;
            }
            if self.flags.contains(ModelFlags::HASHES) {
                w.write_all(&key.cached_hash().to_le_bytes())?;
            }
        }

        Self::align_to_u64(w, start)?;
        let off_weights = to_u32(w.stream_position()? - start, "weight section offset")?;
        for &weight in weights.as_slice() {
            w.write_all(&weight.to_le_bytes())?;
        }

        let end = w.stream_position()?;
        let size = to_u32(end - start, "model size")?;
        w.seek(SeekFrom::Start(start))?;
        w.write_all(MAGIC)?;
        for field in [
            size,
            VERSION,
            self.flags.bits(),
            num_atoms,
            num_keys,
            num_weights,
            off_atoms,
            off_keys,
            off_weights,
        ] {
            w.write_all(&field.to_le_bytes())?;
        }
        w.seek(SeekFrom::Start(end))?;

        debug!(
            atoms = num_atoms,
            keys = num_keys,
            weights = num_weights,
            size,
            "model sections written"
        );
        Ok(())
    }

    fn write_atom<W: Write>(w: &mut W, atom: &Atom) -> io::Result<()> {
        match atom {
            Atom::Str(s) => {
                w.write_all(&[ATOM_STR])?;
                w.write_all(&to_u32(s.len() as u64, "string atom length")?.to_le_bytes())?;
                w.write_all(s.as_bytes())
            }
            Atom::Int(v) => {
                w.write_all(&[ATOM_INT])?;
                w.write_all(&v.to_le_bytes())
            }
            Atom::Label(v) => {
                w.write_all(&[ATOM_LABEL])?;
                w.write_all(&v.to_le_bytes())
            }
        }
    }

    /// Align the position to an 8-byte boundary with zero padding.
    fn align_to_u64<W: Write + Seek>(w: &mut W, start: u64) -> io::Result<()> {
        let pos = w.stream_position()? - start;
        let pad = (8 - pos % 8) % 8;
        w.write_all(&[0u8; 8][..pad as usize])
    }
}
