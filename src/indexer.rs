use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::str::FromStr;

use thiserror::Error;

use crate::atom::Atom;

/// Dense feature id assigned by a [`FeatureIndexer`]
pub type FeatureId = i32;

/// Id returned for a key that is unknown to a locked indexer
pub const UNKNOWN_FEATURE: FeatureId = -1;

/// Maximum number of atoms in a composite key
pub const MAX_ARITY: usize = 11;

/// Separator between atoms in the canonical string of a key
pub const KEY_SEPARATOR: &str = "_###_";

/// Error returned when adding a key to a locked indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tried to add to a locked indexer")]
pub struct LockedIndexerError;

impl From<LockedIndexerError> for io::Error {
    fn from(err: LockedIndexerError) -> Self {
        io::Error::new(io::ErrorKind::PermissionDenied, err)
    }
}

#[inline]
fn check_arity(len: usize) {
    assert!(
        (1..=MAX_ARITY).contains(&len),
        "composite keys hold 1 to {} atoms, got {}",
        MAX_ARITY,
        len
    );
}

#[inline]
pub(crate) fn key_hash(atoms: &[Atom]) -> u64 {
    atoms.iter().fold(5u64, |h, atom| {
        h.wrapping_mul(31).wrapping_add(atom.stable_hash())
    })
}

/// An immutable, ordered tuple of 1 to 11 atoms
///
/// Equality is structural and order-sensitive. The hash is computed once when
/// the key is built.
#[derive(Clone)]
pub struct CompositeKey {
    atoms: Box<[Atom]>,
    hash: u64,
}

impl CompositeKey {
    /// Create a key from its atoms.
    ///
    /// # Panics
    ///
    /// Panics if `atoms` is empty or holds more than [`MAX_ARITY`] atoms.
    pub fn new<A: Into<Box<[Atom]>>>(atoms: A) -> Self {
        let atoms = atoms.into();
        check_arity(atoms.len());
        let hash = key_hash(&atoms);
        Self { atoms, hash }
    }

    /// Rebuild a key whose hash is already known
    pub(crate) fn with_hash(atoms: Box<[Atom]>, hash: u64) -> Self {
        Self { atoms, hash }
    }

    /// The atoms of this key, in order
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Always `false`, keys hold at least one atom
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The cached structural hash
    pub fn cached_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.atoms == other.atoms
    }
}

impl Eq for CompositeKey {}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeKey")
            .field("atoms", &self.atoms)
            .field("hash", &format_args!("{:#018x}", self.hash))
            .finish()
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str(KEY_SEPARATOR)?;
            }
            write!(f, "{}", atom)?;
        }
        Ok(())
    }
}

impl FromStr for CompositeKey {
    type Err = io::Error;

    /// Parse the canonical string of a key.
    ///
    /// Each segment is read back with [`Atom::from_str`], so the string of
    /// any key parses into an equal key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let atoms = s
            .split(KEY_SEPARATOR)
            .map(str::parse)
            .collect::<io::Result<Vec<Atom>>>()?;
        if atoms.len() > MAX_ARITY {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("composite keys hold at most {} atoms", MAX_ARITY),
            ));
        }
        Ok(Self::new(atoms))
    }
}

/// Borrowed view of a key, used to query the index without building a
/// [`CompositeKey`].
pub trait KeyView {
    fn atoms(&self) -> &[Atom];
    fn key_hash(&self) -> u64;
}

impl KeyView for CompositeKey {
    fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    fn key_hash(&self) -> u64 {
        self.hash
    }
}

struct BorrowedKey<'a> {
    atoms: &'a [Atom],
    hash: u64,
}

impl KeyView for BorrowedKey<'_> {
    fn atoms(&self) -> &[Atom] {
        self.atoms
    }

    fn key_hash(&self) -> u64 {
        self.hash
    }
}

impl<'a> Borrow<dyn KeyView + 'a> for CompositeKey {
    fn borrow(&self) -> &(dyn KeyView + 'a) {
        self
    }
}

impl PartialEq for dyn KeyView + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.key_hash() == other.key_hash() && self.atoms() == other.atoms()
    }
}

impl Eq for dyn KeyView + '_ {}

impl Hash for dyn KeyView + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.key_hash());
    }
}

/// Conversion of a key argument into a stack-local atom buffer
///
/// Implemented for tuples of 1 to 11 `Into<Atom>` values, a single [`Atom`],
/// and atom slices.
pub trait IntoAtoms {
    type Atoms: AsRef<[Atom]>;

    fn into_atoms(self) -> Self::Atoms;
}

impl IntoAtoms for Atom {
    type Atoms = [Atom; 1];

    fn into_atoms(self) -> Self::Atoms {
        [self]
    }
}

impl<'a> IntoAtoms for &'a [Atom] {
    type Atoms = &'a [Atom];

    fn into_atoms(self) -> Self::Atoms {
        self
    }
}

impl<'a> IntoAtoms for &'a CompositeKey {
    type Atoms = &'a [Atom];

    fn into_atoms(self) -> Self::Atoms {
        &self.atoms
    }
}

macro_rules! impl_into_atoms {
    ($n:expr; $($t:ident $v:ident),+) => {
        impl<$($t: Into<Atom>),+> IntoAtoms for ($($t,)+) {
            type Atoms = [Atom; $n];

            fn into_atoms(self) -> Self::Atoms {
                let ($($v,)+) = self;
                [$($v.into()),+]
            }
        }
    };
}

impl_into_atoms!(1; T0 a0);
impl_into_atoms!(2; T0 a0, T1 a1);
impl_into_atoms!(3; T0 a0, T1 a1, T2 a2);
impl_into_atoms!(4; T0 a0, T1 a1, T2 a2, T3 a3);
impl_into_atoms!(5; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4);
impl_into_atoms!(6; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4, T5 a5);
impl_into_atoms!(7; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6);
impl_into_atoms!(8; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6, T7 a7);
impl_into_atoms!(9; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6, T7 a7, T8 a8);
impl_into_atoms!(10; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6, T7 a7, T8 a8, T9 a9);
impl_into_atoms!(11; T0 a0, T1 a1, T2 a2, T3 a3, T4 a4, T5 a5, T6 a6, T7 a7, T8 a8, T9 a9, T10 a10);

/// A hash-consing indexer mapping composite keys to dense feature ids
///
/// Ids are assigned in first-seen order starting from 0 and are never reused.
/// While unlocked, unseen keys are appended; once locked, the indexer only
/// answers lookups.
#[derive(Debug, Clone, Default)]
pub struct FeatureIndexer {
    /// Map from key to ID
    ids: HashMap<CompositeKey, FeatureId>,
    /// Map from ID to key
    keys: Vec<CompositeKey>,
    locked: bool,
}

impl FeatureIndexer {
    /// Create a new empty, unlocked indexer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an indexer with room for `capacity` keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashMap::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            locked: false,
        }
    }

    /// Number of distinct keys indexed so far
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no key has been indexed
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Freeze the indexer; unseen keys now map to [`UNKNOWN_FEATURE`]
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Get or create the id of a key.
    ///
    /// ```
    /// use loglin::FeatureIndexer;
    ///
    /// let mut indexer = FeatureIndexer::new();
    /// let id = indexer.get_id(("pos_0_-1_1", 1, 10, 5));
    /// assert_eq!(indexer.get_id(("pos_0_-1_1", 1, 10, 5)), id);
    /// assert_eq!(indexer.len(), 1);
    /// ```
    ///
    /// Returns [`UNKNOWN_FEATURE`] when the key is unseen and the indexer is
    /// locked.
    ///
    /// # Panics
    ///
    /// Panics if the key holds no atom or more than [`MAX_ARITY`] atoms.
    pub fn get_id<K: IntoAtoms>(&mut self, key: K) -> FeatureId {
        let buf = key.into_atoms();
        let atoms = buf.as_ref();
        check_arity(atoms.len());
        let hash = key_hash(atoms);
        if let Some(id) = self.lookup(atoms, hash) {
            return id;
        }
        if self.locked {
            return UNKNOWN_FEATURE;
        }
        let id = self.keys.len() as FeatureId;
        self.insert(CompositeKey::with_hash(Box::from(atoms), hash), id);
        id
    }

    /// Look up the id of a key without ever growing the indexer
    pub fn index_of<K: IntoAtoms>(&self, key: K) -> FeatureId {
        let buf = key.into_atoms();
        let atoms = buf.as_ref();
        if atoms.is_empty() || atoms.len() > MAX_ARITY {
            return UNKNOWN_FEATURE;
        }
        self.lookup(atoms, key_hash(atoms))
            .unwrap_or(UNKNOWN_FEATURE)
    }

    /// Add a key through the strict path.
    ///
    /// Returns `Ok(true)` if the key was new, `Ok(false)` if it was already
    /// indexed, and an error if the indexer is locked.
    pub fn add(&mut self, key: CompositeKey) -> Result<bool, LockedIndexerError> {
        if self.locked {
            return Err(LockedIndexerError);
        }
        if self.ids.contains_key(&key) {
            return Ok(false);
        }
        let id = self.keys.len() as FeatureId;
        self.insert(key, id);
        Ok(true)
    }

    /// Get the key of an id
    pub fn key(&self, id: FeatureId) -> Option<&CompositeKey> {
        usize::try_from(id).ok().and_then(|i| self.keys.get(i))
    }

    /// Canonical string of the key of an id, atoms joined by [`KEY_SEPARATOR`]
    pub fn key_to_string(&self, id: FeatureId) -> Option<String> {
        self.key(id).map(|key| key.to_string())
    }

    /// Iterate over all (id, key) pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &CompositeKey)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(id, key)| (id as FeatureId, key))
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.ids.clear();
        self.keys.clear();
    }

    /// Append a key read back from a serialized model.
    ///
    /// Keys must arrive in id order; a duplicate means the data is corrupt.
    pub(crate) fn restore(&mut self, key: CompositeKey) -> io::Result<()> {
        if self.ids.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("duplicate key in model: {}", key),
            ));
        }
        let id = self.keys.len() as FeatureId;
        self.insert(key, id);
        Ok(())
    }

    fn lookup(&self, atoms: &[Atom], hash: u64) -> Option<FeatureId> {
        let key = BorrowedKey { atoms, hash };
        self.ids.get(&key as &dyn KeyView).copied()
    }

    fn insert(&mut self, key: CompositeKey, id: FeatureId) {
        self.ids.insert(key.clone(), id);
        self.keys.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_basic() {
        let mut indexer = FeatureIndexer::new();
        assert_eq!(indexer.len(), 0);

        let id1 = indexer.get_id(("hello",));
        assert_eq!(id1, 0);
        assert_eq!(indexer.len(), 1);

        let id2 = indexer.get_id(("hello", "world"));
        assert_eq!(id2, 1);
        assert_eq!(indexer.len(), 2);

        // Getting the same key should return the same ID
        let id3 = indexer.get_id(("hello",));
        assert_eq!(id3, id1);
        assert_eq!(indexer.len(), 2);
    }

    #[test]
    fn test_key_to_string() {
        let mut indexer = FeatureIndexer::new();
        indexer.get_id((1, 2, 3));
        assert_eq!(indexer.key_to_string(0).as_deref(), Some("1_###_2_###_3"));
        assert_eq!(indexer.key_to_string(1), None);
        assert_eq!(indexer.key_to_string(UNKNOWN_FEATURE), None);
    }

    #[test]
    fn test_hash_consing() {
        let mut indexer = FeatureIndexer::new();
        let template1 = String::from("pos_0_-1_1");
        let template2 = String::from("pos_0_-1_1");

        indexer.get_id((template1.as_str(), 1, 10, 5));
        indexer.get_id((template1.as_str(), 3, 2, 2));
        assert_eq!(indexer.len(), 2);
        indexer.get_id((template2.as_str(), 1, 10, 5));
        assert_eq!(indexer.len(), 2);
    }

    #[test]
    fn test_order_sensitive() {
        let mut indexer = FeatureIndexer::new();
        let ab = indexer.get_id(("a", "b"));
        let ba = indexer.get_id(("b", "a"));
        assert_ne!(ab, ba);
        assert_eq!(indexer.len(), 2);
    }

    #[test]
    fn test_atom_kinds_are_distinct() {
        let mut indexer = FeatureIndexer::new();
        let s = indexer.get_id(("1",));
        let i = indexer.get_id((1,));
        let l = indexer.get_id(Atom::label(1));
        assert_eq!(indexer.len(), 3);
        assert!(s != i && i != l && s != l);
    }

    #[test]
    fn test_locked_indexer() {
        let mut indexer = FeatureIndexer::new();
        let known = indexer.get_id(("w", "dog"));
        indexer.lock();

        assert_eq!(indexer.get_id(("w", "dog")), known);
        assert_eq!(indexer.get_id(("w", "cat")), UNKNOWN_FEATURE);
        assert_eq!(indexer.len(), 1);

        let err = indexer.add(CompositeKey::new(vec![Atom::from("w"), Atom::from("cat")]));
        assert_eq!(err, Err(LockedIndexerError));
        let io_err: io::Error = LockedIndexerError.into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);

        indexer.unlock();
        assert_eq!(indexer.get_id(("w", "cat")), 1);
    }

    #[test]
    fn test_add_strict() {
        let mut indexer = FeatureIndexer::new();
        let key = CompositeKey::new(vec![Atom::from("bias")]);
        assert_eq!(indexer.add(key.clone()), Ok(true));
        assert_eq!(indexer.add(key.clone()), Ok(false));
        assert_eq!(indexer.index_of(&key), 0);
        assert_eq!(indexer.get_id(("bias",)), 0);
    }

    #[test]
    fn test_index_of_never_grows() {
        let mut indexer = FeatureIndexer::new();
        indexer.get_id(("a", 1));
        assert_eq!(indexer.index_of(("a", 1)), 0);
        assert_eq!(indexer.index_of(("a", 2)), UNKNOWN_FEATURE);
        let empty: &[Atom] = &[];
        assert_eq!(indexer.index_of(empty), UNKNOWN_FEATURE);
        assert_eq!(indexer.len(), 1);
    }

    #[test]
    fn test_max_arity() {
        let mut indexer = FeatureIndexer::new();
        let id = indexer.get_id((0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10));
        assert_eq!(
            indexer.key_to_string(id).as_deref(),
            Some("0_###_1_###_2_###_3_###_4_###_5_###_6_###_7_###_8_###_9_###_10")
        );
    }

    #[test]
    #[should_panic(expected = "composite keys hold 1 to 11 atoms")]
    fn test_empty_key_panics() {
        let mut indexer = FeatureIndexer::new();
        let empty: &[Atom] = &[];
        indexer.get_id(empty);
    }

    #[test]
    fn test_key_string_round_trip() {
        let key = CompositeKey::new(vec![
            Atom::from("tmpl"),
            Atom::from(-1),
            Atom::label(4),
            Atom::from("NN"),
        ]);
        let s = key.to_string();
        assert_eq!(s, "tmpl_###_-1_###_#4_###_NN");
        let parsed: CompositeKey = s.parse().unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.cached_hash(), key.cached_hash());
    }

    #[test]
    fn test_key_string_round_trip_ambiguous_strings() {
        let key = CompositeKey::new(vec![
            Atom::from("a_###_b"),
            Atom::from("3"),
            Atom::from("#3"),
            Atom::from("\\"),
            Atom::from(""),
            Atom::from(3),
        ]);
        let s = key.to_string();
        assert_eq!(s.matches(KEY_SEPARATOR).count(), 5);
        let parsed: CompositeKey = s.parse().unwrap();
        assert_eq!(parsed, key);

        let mut indexer = FeatureIndexer::new();
        let id = indexer.get_id(&key);
        let s = indexer.key_to_string(id).unwrap();
        let reparsed: CompositeKey = s.parse().unwrap();
        assert_eq!(indexer.get_id(&reparsed), id);
        assert_eq!(indexer.len(), 1);
    }

    #[test]
    fn test_indexer_iter_and_clear() {
        let mut indexer = FeatureIndexer::new();
        indexer.get_id(("hello",));
        indexer.get_id(("world",));
        indexer.get_id(("rust",));

        let items: Vec<_> = indexer.iter().map(|(id, key)| (id, key.to_string())).collect();
        assert_eq!(
            items,
            vec![
                (0, "hello".to_string()),
                (1, "world".to_string()),
                (2, "rust".to_string())
            ]
        );

        indexer.clear();
        assert!(indexer.is_empty());
        assert_eq!(indexer.get_id(("rust",)), 0);
    }
}
