//! Per-element property storage.
//!
//! Every element kind of a [`HalfEdgeMesh`](super::HalfEdgeMesh) owns a
//! [`PropertyContainer`]: a set of named, dynamically typed arrays that all
//! have one entry per element. Positions live here (`"v:point"`) next to any
//! attribute a caller or an algorithm wants to attach, so that duplicating
//! or compacting elements keeps every attribute in step without knowing its
//! type.
//!
//! Arrays are addressed through a typed [`Property<T>`] handle returned when
//! the array is added. Removing an array retires its slot; slots are never
//! reused, so a stale handle can never alias a newer array of another type.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Object-safe operations shared by all property arrays.
trait PropertyArray: Any + Send + Sync {
    fn name(&self) -> &str;
    fn type_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn push(&mut self);
    fn resize(&mut self, n: usize);
    fn copy(&mut self, from: usize, to: usize);
    fn retain(&mut self, keep: &[bool]);
    fn clone_box(&self) -> Box<dyn PropertyArray>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct TypedArray<T> {
    name: String,
    data: Vec<T>,
    default: T,
}

impl<T: Clone + Send + Sync + 'static> PropertyArray for TypedArray<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn push(&mut self) {
        self.data.push(self.default.clone());
    }

    fn resize(&mut self, n: usize) {
        self.data.resize(n, self.default.clone());
    }

    fn copy(&mut self, from: usize, to: usize) {
        let value = self.data[from].clone();
        self.data[to] = value;
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut i = 0;
        self.data.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
    }

    fn clone_box(&self) -> Box<dyn PropertyArray> {
        Box::new(TypedArray {
            name: self.name.clone(),
            data: self.data.clone(),
            default: self.default.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed handle to one property array of a [`PropertyContainer`].
pub struct Property<T> {
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    fn new(slot: usize) -> Self {
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    pub(crate) fn slot(self) -> usize {
        self.slot
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Property<T> {}

impl<T> PartialEq for Property<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> Eq for Property<T> {}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property<{}>({})", std::any::type_name::<T>(), self.slot)
    }
}

/// A set of named property arrays of equal length.
#[derive(Default)]
pub struct PropertyContainer {
    arrays: Vec<Option<Box<dyn PropertyArray>>>,
    size: usize,
}

impl Clone for PropertyContainer {
    fn clone(&self) -> Self {
        Self {
            arrays: self
                .arrays
                .iter()
                .map(|a| a.as_ref().map(|a| a.clone_box()))
                .collect(),
            size: self.size,
        }
    }
}

impl fmt::Debug for PropertyContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for a in self.arrays.iter().flatten() {
            list.entry(&a.name(), &a.type_name());
        }
        list.finish()
    }
}

impl PropertyContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements (the length of every array).
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the container holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of live property arrays.
    pub fn num_properties(&self) -> usize {
        self.arrays.iter().flatten().count()
    }

    /// Names of all live property arrays, in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.arrays.iter().flatten().map(|a| a.name()).collect()
    }

    /// Whether an array with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.arrays.iter().flatten().any(|a| a.name() == name)
    }

    /// Add a new array filled with `default`.
    ///
    /// Returns `None` if an array with the same name already exists.
    pub fn add<T: Clone + Send + Sync + 'static>(&mut self, name: &str, default: T) -> Option<Property<T>> {
        if self.exists(name) {
            return None;
        }
        let array = TypedArray {
            name: name.to_string(),
            data: vec![default.clone(); self.size],
            default,
        };
        self.arrays.push(Some(Box::new(array)));
        Some(Property::new(self.arrays.len() - 1))
    }

    /// Look up an existing array by name and element type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<Property<T>> {
        self.arrays.iter().enumerate().find_map(|(slot, a)| {
            let a = a.as_ref()?;
            if a.name() == name && a.as_any().is::<TypedArray<T>>() {
                Some(Property::new(slot))
            } else {
                None
            }
        })
    }

    /// Look up an array, adding it if it does not exist yet.
    ///
    /// Returns `None` only if the name is taken by an array of another type.
    pub fn get_or_add<T: Clone + Send + Sync + 'static>(&mut self, name: &str, default: T) -> Option<Property<T>> {
        match self.get(name) {
            Some(p) => Some(p),
            None => self.add(name, default),
        }
    }

    /// Remove an array. Returns `false` if the handle was already stale.
    pub fn remove<T: 'static>(&mut self, p: Property<T>) -> bool {
        match self.arrays.get_mut(p.slot) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Read access to an array, `None` if the handle is stale.
    pub fn array<T: 'static>(&self, p: Property<T>) -> Option<&[T]> {
        let a = self.arrays.get(p.slot)?.as_ref()?;
        a.as_any()
            .downcast_ref::<TypedArray<T>>()
            .map(|a| a.data.as_slice())
    }

    /// Write access to an array, `None` if the handle is stale.
    pub fn array_mut<T: 'static>(&mut self, p: Property<T>) -> Option<&mut [T]> {
        let a = self.arrays.get_mut(p.slot)?.as_mut()?;
        a.as_any_mut()
            .downcast_mut::<TypedArray<T>>()
            .map(|a| a.data.as_mut_slice())
    }

    /// Append one element (every array grows by its default value).
    pub fn push(&mut self) {
        for a in self.arrays.iter_mut().flatten() {
            a.push();
        }
        self.size += 1;
    }

    /// Resize every array to `n` elements.
    pub fn resize(&mut self, n: usize) {
        for a in self.arrays.iter_mut().flatten() {
            a.resize(n);
        }
        self.size = n;
    }

    /// Copy element `from` onto element `to` in every array.
    pub fn copy(&mut self, from: usize, to: usize) {
        for a in self.arrays.iter_mut().flatten() {
            a.copy(from, to);
        }
    }

    /// Keep only the elements whose flag in `keep` is set.
    ///
    /// # Panics
    /// Panics if `keep.len()` differs from [`len`](Self::len).
    pub fn retain(&mut self, keep: &[bool]) {
        assert_eq!(keep.len(), self.size, "retain mask has wrong length");
        for a in self.arrays.iter_mut().flatten() {
            debug_assert_eq!(a.len(), self.size);
            a.retain(keep);
        }
        self.size = keep.iter().filter(|&&k| k).count();
    }
}
