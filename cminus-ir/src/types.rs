//! IR Type System
//!
//! Types are interned: constructing the same structural type twice yields the
//! same [`TypeId`], so type equality anywhere in the compiler is a handle
//! comparison, never a deep structural walk. The table lives inside the
//! [`Module`](crate::module::Module) and is the only place types are created.

use std::collections::HashMap;
use std::fmt;

/// Canonical handle to an interned type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural description of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    /// 1-bit integer, the result of comparisons
    Int1,
    /// 32-bit signed integer
    Int32,
    /// 32-bit float
    Float,
    Pointer(TypeId),
    Array {
        elem: TypeId,
        len: u32,
    },
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
    },
}

/// The canonical type table
///
/// Primitives are pre-interned so the common lookups are field reads.
#[derive(Debug)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    interned: HashMap<TypeKind, TypeId>,
    void: TypeId,
    int1: TypeId,
    int32: TypeId,
    float: TypeId,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            kinds: Vec::new(),
            interned: HashMap::new(),
            void: TypeId(0),
            int1: TypeId(0),
            int32: TypeId(0),
            float: TypeId(0),
        };
        table.void = table.intern(TypeKind::Void);
        table.int1 = table.intern(TypeKind::Int1);
        table.int32 = table.intern(TypeKind::Int32);
        table.float = table.intern(TypeKind::Float);
        table
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.interned.insert(kind, id);
        id
    }

    pub fn void_ty(&self) -> TypeId {
        self.void
    }

    pub fn int1_ty(&self) -> TypeId {
        self.int1
    }

    pub fn int32_ty(&self) -> TypeId {
        self.int32
    }

    pub fn float_ty(&self) -> TypeId {
        self.float
    }

    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(pointee))
    }

    pub fn array_of(&mut self, elem: TypeId, len: u32) -> TypeId {
        self.intern(TypeKind::Array { elem, len })
    }

    pub fn function_of(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Function { ret, params })
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Void)
    }

    /// Integer types: i1 and i32
    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Int1 | TypeKind::Int32)
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Float)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer(_))
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Array { .. })
    }

    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Function { .. })
    }

    /// Element type of a pointer, or `None` for anything else
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    /// Element type of an array, or `None` for anything else
    pub fn array_elem(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Array { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    /// Return type of a function type
    pub fn return_type(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Function { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    /// Parameter types of a function type
    pub fn param_types(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.kind(id) {
            TypeKind::Function { params, .. } => Some(params),
            _ => None,
        }
    }

    /// Render a type for diagnostics and IR dumps
    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { table: self, id }
    }
}

/// Display adapter: types are handles, so rendering needs the table
pub struct TypeDisplay<'a> {
    table: &'a TypeTable,
    id: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table.kind(self.id) {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Int1 => write!(f, "i1"),
            TypeKind::Int32 => write!(f, "i32"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Pointer(p) => write!(f, "{}*", self.table.display(*p)),
            TypeKind::Array { elem, len } => {
                write!(f, "[{} x {}]", len, self.table.display(*elem))
            }
            TypeKind::Function { ret, params } => {
                write!(f, "{} (", self.table.display(*ret))?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.table.display(*p))?;
                }
                write!(f, ")")
            }
        }
    }
}
