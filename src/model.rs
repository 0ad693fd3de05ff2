use std::{
    fmt,
    io::{self, Write},
    sync::Arc,
};

use bitflags::bitflags;
use bstr::ByteSlice;
use tracing::info;

use crate::atom::Atom;
use crate::classifier::argmax;
use crate::example::Example;
use crate::indexer::{key_hash, CompositeKey, FeatureId, FeatureIndexer, IntoAtoms, MAX_ARITY};
use crate::weight::WeightVector;

pub(crate) const MAGIC: &[u8; 4] = b"LLMD";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_SIZE: usize = 40;

pub(crate) const ATOM_STR: u8 = 0;
pub(crate) const ATOM_INT: u8 = 1;
pub(crate) const ATOM_LABEL: u8 = 2;

bitflags! {
    /// Model file flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModelFlags: u32 {
        /// The indexer is locked after loading
        const LOCKED = 0x01;
        /// Each key is followed by its cached hash
        const HASHES = 0x02;
    }
}

/// Bounds-checked little-endian reader over a model buffer
struct Unpacker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    fn new(buf: &'a [u8], pos: usize) -> io::Result<Self> {
        if pos > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "section offset out of bounds",
            ));
        }
        Ok(Self { buf, pos })
    }

    /// Upper bound on the records of `min_size` bytes left in the buffer
    fn capacity_for(&self, count: u32, min_size: usize) -> usize {
        (count as usize).min((self.buf.len() - self.pos) / min_size)
    }

    fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let bytes = &self.buf[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough data in model",
            )),
        }
    }

    fn take_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    fn u8(&mut self) -> io::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> io::Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> io::Result<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    fn i64(&mut self) -> io::Result<i64> {
        self.take_array().map(i64::from_le_bytes)
    }

    fn f64(&mut self) -> io::Result<f64> {
        self.take_array().map(f64::from_le_bytes)
    }
}

#[derive(Debug, Clone)]
struct Header {
    magic: [u8; 4],
    size: u32,
    version: u32,
    flags: ModelFlags,
    num_atoms: u32,
    num_keys: u32,
    num_weights: u32,
    off_atoms: u32,
    off_keys: u32,
    off_weights: u32,
}

impl Header {
    fn parse(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(io::Error::other("invalid model format"));
        }
        let mut r = Unpacker::new(buf, 0)?;
        let magic: [u8; 4] = r.take_array()?;
        if &magic != MAGIC {
            return Err(io::Error::other("invalid file format, magic mismatch"));
        }
        let size = r.u32()?;
        let version = r.u32()?;
        if version != VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported model version {}", version),
            ));
        }
        let flags = ModelFlags::from_bits(r.u32()?).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "unknown model flags")
        })?;
        Ok(Self {
            magic,
            size,
            version,
            flags,
            num_atoms: r.u32()?,
            num_keys: r.u32()?,
            num_weights: r.u32()?,
            off_atoms: r.u32()?,
            off_keys: r.u32()?,
            off_weights: r.u32()?,
        })
    }
}

/// A trained model: the feature indexer and its weights
///
/// Reloading keeps every feature id exactly as assigned during training, so
/// the weights line up with the ids the indexer returns.
pub struct Model {
    header: Header,
    indexer: FeatureIndexer,
    weights: WeightVector,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("header", &self.header)
            .field("num_keys", &self.indexer.len())
            .field("num_weights", &self.weights.len())
            .finish()
    }
}

impl Model {
    /// Load a model from memory
    pub fn new(buf: &[u8]) -> io::Result<Self> {
        let header = Header::parse(buf)?;
        let atoms = Self::read_atoms(buf, &header)?;
        let indexer = Self::read_keys(buf, &header, &atoms)?;
        let weights = Self::read_weights(buf, &header)?;
        info!(
            keys = indexer.len(),
            atoms = atoms.len(),
            weights = weights.len(),
            locked = indexer.is_locked(),
            "model loaded"
        );
        Ok(Self {
            header,
            indexer,
            weights,
        })
    }

    fn read_atoms(buf: &[u8], header: &Header) -> io::Result<Vec<Atom>> {
        let mut r = Unpacker::new(buf, header.off_atoms as usize)?;
        let mut atoms = Vec::with_capacity(r.capacity_for(header.num_atoms, 1));
        for _ in 0..header.num_atoms {
            let atom = match r.u8()? {
                ATOM_STR => {
                    let len = r.u32()? as usize;
                    let s = r.take(len)?.to_str().map_err(|e| {
                        io::Error::new(io::ErrorKind::InvalidData, e)
                    })?;
                    Atom::Str(Arc::from(s))
                }
                ATOM_INT => Atom::Int(r.i64()?),
                ATOM_LABEL => Atom::Label(r.u32()?),
                tag => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unknown atom tag {}", tag),
                    ))
                }
            };
            atoms.push(atom);
        }
        Ok(atoms)
    }

    fn read_keys(buf: &[u8], header: &Header, atoms: &[Atom]) -> io::Result<FeatureIndexer> {
        let with_hashes = header.flags.contains(ModelFlags::HASHES);
        let mut r = Unpacker::new(buf, header.off_keys as usize)?;
        let mut indexer = FeatureIndexer::with_capacity(r.capacity_for(header.num_keys, 5));
        let mut key_atoms = Vec::with_capacity(MAX_ARITY);
        for _ in 0..header.num_keys {
            let arity = r.u8()? as usize;
            if arity == 0 || arity > MAX_ARITY {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid key arity {}", arity),
                ));
            }
            key_atoms.clear();
            for _ in 0..arity {
                let aid = r.u32()? as usize;
                let atom = atoms.get(aid).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "atom index out of range")
                })?;
                key_atoms.push(atom.clone());
            }
            let hash = if with_hashes {
                r.u64()?
            } else {
                key_hash(&key_atoms)
            };
            let key = CompositeKey::with_hash(key_atoms.as_slice().into(), hash);
            indexer.restore(key)?;
        }
        if header.flags.contains(ModelFlags::LOCKED) {
            indexer.lock();
        }
        Ok(indexer)
    }

    fn read_weights(buf: &[u8], header: &Header) -> io::Result<WeightVector> {
        let mut r = Unpacker::new(buf, header.off_weights as usize)?;
        let mut weights = Vec::with_capacity(r.capacity_for(header.num_weights, 8));
        for _ in 0..header.num_weights {
            weights.push(r.f64()?);
        }
        Ok(WeightVector::from(weights))
    }

    /// Model file flags
    pub fn flags(&self) -> ModelFlags {
        self.header.flags
    }

    pub fn indexer(&self) -> &FeatureIndexer {
        &self.indexer
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    /// Id of a feature key, [`UNKNOWN_FEATURE`](crate::UNKNOWN_FEATURE) if absent
    pub fn feature_id<K: IntoAtoms>(&self, key: K) -> FeatureId {
        self.indexer.index_of(key)
    }

    /// Sum of the weights of `features`
    pub fn score(&self, features: &[FeatureId]) -> f64 {
        self.weights.score(features)
    }

    /// Arg-max label among `examples` and its score
    pub fn predict<'e, L>(&self, examples: &'e [Example<L>]) -> Option<(&'e L, f64)> {
        argmax(&self.weights, examples)
    }

    /// Take the indexer and weights, e.g. to resume training
    pub fn into_parts(self) -> (FeatureIndexer, WeightVector) {
        (self.indexer, self.weights)
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let header = &self.header;
        writeln!(w, "FILEHEADER = {{")?;
        writeln!(w, "  magic: {}", header.magic.as_bstr())?;
        writeln!(w, "  size: {}", header.size)?;
        writeln!(w, "  version: {}", header.version)?;
        writeln!(w, "  flags: {:?}", header.flags)?;
        writeln!(w, "  num_atoms: {}", header.num_atoms)?;
        writeln!(w, "  num_keys: {}", header.num_keys)?;
        writeln!(w, "  num_weights: {}", header.num_weights)?;
        writeln!(w, "  off_atoms: {:#X}", header.off_atoms)?;
        writeln!(w, "  off_keys: {:#X}", header.off_keys)?;
        writeln!(w, "  off_weights: {:#X}", header.off_weights)?;
        writeln!(w, "}}\n")?;
        writeln!(w, "FEATURES = {{")?;
        for (id, key) in self.indexer.iter() {
            let weight = self.weights.get(id);
            if weight != 0.0 {
                writeln!(w, "  {:>5}: {} --> {:.6}", id, key, weight)?;
            }
        }
        writeln!(w, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_short_buffer() {
        let err = Model::new(b"LLMD").unwrap_err();
        assert_eq!(err.to_string(), "invalid model format");
    }

    #[test]
    fn test_reject_bad_magic() {
        let buf = [0u8; HEADER_SIZE];
        let err = Model::new(&buf).unwrap_err();
        assert!(err.to_string().contains("magic mismatch"));
    }

    #[test]
    fn test_reject_bad_version() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&7u32.to_le_bytes());
        let err = Model::new(&buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_empty_model() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[4..8].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        buf[8..12].copy_from_slice(&VERSION.to_le_bytes());
        buf[12..16].copy_from_slice(&ModelFlags::LOCKED.bits().to_le_bytes());
        let model = Model::new(&buf).unwrap();
        assert!(model.indexer().is_empty());
        assert!(model.indexer().is_locked());
        assert!(model.weights().is_empty());
    }

    fn header_with_counts(num_atoms: u32, num_keys: u32, num_weights: u32) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&VERSION.to_le_bytes());
        buf[16..20].copy_from_slice(&num_atoms.to_le_bytes());
        buf[20..24].copy_from_slice(&num_keys.to_le_bytes());
        buf[24..28].copy_from_slice(&num_weights.to_le_bytes());
        for off in [28, 32, 36] {
            buf[off..off + 4].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_huge_counts_fail_without_allocating() {
        for buf in [
            header_with_counts(u32::MAX, 0, 0),
            header_with_counts(0, u32::MAX, 0),
            header_with_counts(0, 0, u32::MAX),
        ] {
            let err = Model::new(&buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        }
    }

    #[test]
    fn test_truncated_section() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&VERSION.to_le_bytes());
        // one weight announced at offset 40, no bytes follow
        buf[24..28].copy_from_slice(&1u32.to_le_bytes());
        buf[36..40].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        let err = Model::new(&buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
