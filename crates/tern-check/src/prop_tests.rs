//! Property tests for the type world using proptest.
//!
//! These stress invariants that must hold for ANY types, not just
//! hand-picked examples:
//!
//! 1. Interning: building the same structural type twice yields the same
//!    handle, so handle equality is semantic equality.
//! 2. Join is commutative and idempotent, with bottom as identity.
//! 3. Rewrite is the identity when the replaced types do not occur.
//! 4. `contains` agrees with rewriting: a type that does not contain a
//!    parameter is untouched by substituting it.

use proptest::prelude::*;

use tern_ast::NodeId;
use tern_types::{PrimType, TypeId, TypeWorld};

/// A world-independent description of a structural type, so that
/// strategies can build the same shape into several worlds.
#[derive(Debug, Clone)]
enum Shape {
    Prim(PrimType),
    Tuple(Vec<Shape>),
    Variadic(Box<Shape>),
    Pi(Box<Shape>, Box<Shape>),
    Ptr(Box<Shape>),
    Param(u32),
    NoRet,
}

fn build(world: &mut TypeWorld, shape: &Shape) -> TypeId {
    match shape {
        Shape::Prim(prim) => world.prim(*prim),
        Shape::Tuple(elems) => {
            let elems = elems.iter().map(|e| build(world, e)).collect();
            world.tuple(elems)
        }
        Shape::Variadic(elem) => {
            let elem = build(world, elem);
            world.variadic(elem)
        }
        Shape::Pi(dom, cod) => {
            let dom = build(world, dom);
            let cod = build(world, cod);
            world.pi(dom, cod)
        }
        Shape::Ptr(pointee) => {
            let pointee = build(world, pointee);
            world.ptr(pointee)
        }
        Shape::Param(index) => world.param(NodeId(0), *index, format!("T{index}")),
        Shape::NoRet => world.type_no_ret(),
    }
}

fn arb_prim() -> impl Strategy<Value = PrimType> {
    prop_oneof![
        Just(PrimType::Bool),
        prop::sample::select(&[8u32, 16, 32, 64]).prop_map(PrimType::Sint),
        prop::sample::select(&[8u32, 16, 32, 64]).prop_map(PrimType::Uint),
        prop::sample::select(&[32u32, 64]).prop_map(PrimType::Real),
    ]
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        arb_prim().prop_map(Shape::Prim),
        (0u32..3).prop_map(Shape::Param),
        Just(Shape::NoRet),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::Tuple),
            inner.clone().prop_map(|s| Shape::Variadic(Box::new(s))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Shape::Pi(Box::new(a), Box::new(b))),
            inner.prop_map(|s| Shape::Ptr(Box::new(s))),
        ]
    })
}

proptest! {
    #[test]
    fn interning_is_stable(shape in arb_shape()) {
        let mut world = TypeWorld::new();
        let a = build(&mut world, &shape);
        let b = build(&mut world, &shape);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn join_is_idempotent(shape in arb_shape()) {
        let mut world = TypeWorld::new();
        let ty = build(&mut world, &shape);
        prop_assert_eq!(world.join(ty, ty), Some(ty));
    }

    #[test]
    fn join_is_commutative(a in arb_shape(), b in arb_shape()) {
        let mut world = TypeWorld::new();
        let ta = build(&mut world, &a);
        let tb = build(&mut world, &b);
        prop_assert_eq!(world.join(ta, tb), world.join(tb, ta));
    }

    #[test]
    fn no_ret_is_join_identity(shape in arb_shape()) {
        let mut world = TypeWorld::new();
        let ty = build(&mut world, &shape);
        let no_ret = world.type_no_ret();
        prop_assert_eq!(world.join(no_ret, ty), Some(ty));
    }

    #[test]
    fn rewrite_without_occurrence_is_identity(shape in arb_shape()) {
        let mut world = TypeWorld::new();
        let ty = build(&mut world, &shape);
        // Parameter 99 never occurs in generated shapes.
        let absent = world.param(NodeId(0), 99, "T99");
        let i32_ty = world.type_sint(32);
        prop_assert!(!world.contains(ty, absent));
        prop_assert_eq!(world.rewrite(ty, &[absent], &[i32_ty]), ty);
    }

    #[test]
    fn rewrite_eliminates_the_parameter(shape in arb_shape()) {
        let mut world = TypeWorld::new();
        let ty = build(&mut world, &shape);
        let i32_ty = world.type_sint(32);
        let params: Vec<_> = (0u32..3)
            .map(|i| world.param(NodeId(0), i, format!("T{i}")))
            .collect();
        let args = vec![i32_ty; params.len()];
        let rewritten = world.rewrite(ty, &params, &args);
        for &param in &params {
            prop_assert!(!world.contains(rewritten, param));
        }
    }

    #[test]
    fn contains_is_reflexive(shape in arb_shape()) {
        let mut world = TypeWorld::new();
        let ty = build(&mut world, &shape);
        prop_assert!(world.contains(ty, ty));
    }
}
