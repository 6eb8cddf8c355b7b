use rumoca_frontend::s2_analyzer::symbols::{ClassId, ObjectValue};
use rumoca_frontend::s2_analyzer::{
    Context, ContextOptions, CyclePolicy, MemoryStorage, NamedElement, Reference, Scope, ScopeId,
};
use unindent::unindent;

fn class(cx: &mut Context, dotted: &str) -> ClassId {
    ScopeId::Context
        .resolve(cx, &Reference::parse(dotted), false)
        .and_then(NamedElement::class)
        .unwrap_or_else(|| panic!("class {dotted} not found"))
}

fn value(cx: &mut Context, dotted: &str) -> Option<ObjectValue> {
    let component = ScopeId::Context
        .resolve(cx, &Reference::parse(dotted), false)
        .and_then(NamedElement::component)?;
    cx.component_value(component).map(|v| v.value)
}

fn names(cx: &Context, classes: &[ClassId]) -> Vec<String> {
    classes.iter().map(|c| cx.class(*c).identifier.clone()).collect()
}

fn library() -> MemoryStorage {
    MemoryStorage::new()
        .with_file(
            "Lib/package.mo",
            &unindent(
                r#"
                package Lib
                  constant Real g = 9.81;
                  model Base
                    parameter Real x = 1.0;
                  end Base;
                end Lib;
                "#,
            ),
        )
        .with_file(
            "Lib/Derived.mo",
            &unindent(
                r#"
                within Lib;
                model Derived
                  extends Base(x = 3.0);
                  parameter Real y = x * 2;
                end Derived;
                "#,
            ),
        )
}

#[test]
fn memoized_library_reads() {
    let storage = library();
    let mut cx = Context::new();
    cx.add_library(Box::new(storage.clone()));

    let first = class(&mut cx, "Lib.Derived");
    let reads = storage.reads();
    assert!(reads > 0);
    let first_bases = cx.base_classes(first);
    let first_components = cx.components(first);
    let count = cx.class_count();

    for _ in 0..3 {
        let again = class(&mut cx, "Lib.Derived");
        assert_eq!(again, first);
        assert_eq!(cx.base_classes(again), first_bases);
        assert_eq!(cx.components(again), first_components);
    }
    assert_eq!(storage.reads(), reads);
    assert_eq!(cx.class_count(), count);
}

#[test]
fn override_ordering() {
    let mut cx = Context::new();
    cx.add_library(Box::new(library()));
    assert_eq!(value(&mut cx, "Lib.Base.x"), Some(ObjectValue::Real(1.0)));
    assert_eq!(value(&mut cx, "Lib.Derived.x"), Some(ObjectValue::Real(3.0)));
    assert_eq!(value(&mut cx, "Lib.Derived.y"), Some(ObjectValue::Real(6.0)));

    cx.open_document(
        "outer.mo",
        "model Outer Lib.Derived d(x = 5.0); end Outer;",
    );
    assert_eq!(value(&mut cx, "Outer.d.x"), Some(ObjectValue::Real(5.0)));
    assert_eq!(value(&mut cx, "Outer.d.y"), Some(ObjectValue::Real(10.0)));
}

#[test]
fn documents_shadow_libraries() {
    let mut cx = Context::new();
    cx.add_library(Box::new(library()));
    cx.open_document(
        "lib.mo",
        "package Lib constant Real g = 1.62; end Lib;",
    );
    assert_eq!(value(&mut cx, "Lib.g"), Some(ObjectValue::Real(1.62)));
    assert!(ScopeId::Context
        .resolve(&mut cx, &Reference::parse("Lib.Derived"), false)
        .is_none());
}

#[test]
fn flattening_order() {
    let mut cx = Context::new();
    cx.open_document(
        "chain.mo",
        &unindent(
            r#"
            model A Real a; end A;
            model B extends A; Real b; end B;
            model C extends B; Real c; end C;
            "#,
        ),
    );
    let c = class(&mut cx, "C");
    let bases = cx.base_classes(c);
    assert_eq!(names(&cx, &bases), vec!["B", "A"]);
}

#[test]
fn promotion_and_concatenation() {
    let mut cx = Context::new();
    cx.open_document(
        "consts.mo",
        &unindent(
            r#"
            package K
              constant Real r = 1 + 2.5;
              constant Integer i = 1 + 2;
              constant String s = "a" + "b";
              constant Boolean bad = true + 1;
            end K;
            "#,
        ),
    );
    assert_eq!(value(&mut cx, "K.r"), Some(ObjectValue::Real(3.5)));
    assert_eq!(value(&mut cx, "K.i"), Some(ObjectValue::Integer(3)));
    assert_eq!(value(&mut cx, "K.s"), Some(ObjectValue::String("ab".to_string())));
    assert_eq!(value(&mut cx, "K.bad"), None);
}

#[test]
fn local_versus_global_resolution() {
    let mut cx = Context::new();
    cx.open_document(
        "scopes.mo",
        &unindent(
            r#"
            package Units
              constant Integer scale = 1;
            end Units;
            package App
              package Units
                constant Integer scale = 1000;
              end Units;
              constant Integer local = Units.scale;
              constant Integer global = .Units.scale;
            end App;
            "#,
        ),
    );
    assert_eq!(value(&mut cx, "App.local"), Some(ObjectValue::Integer(1000)));
    assert_eq!(value(&mut cx, "App.global"), Some(ObjectValue::Integer(1)));
}

#[test]
fn cycles_terminate_and_are_reported() {
    let code = "model R extends R; Real x = 1; end R;";

    let mut cx = Context::new();
    cx.open_document("r.mo", code);
    let r = class(&mut cx, "R");
    assert!(cx.base_classes(r).is_empty());
    assert_eq!(value(&mut cx, "R.x"), Some(ObjectValue::Real(1.0)));
    assert!(!cx.cycles().is_empty());

    let mut silent = Context::with_options(ContextOptions {
        cycle_policy: CyclePolicy::Silent,
    });
    silent.open_document("r.mo", code);
    let r = class(&mut silent, "R");
    assert!(silent.base_classes(r).is_empty());
    assert!(silent.cycles().is_empty());
}

#[test]
fn sibling_records_with_forward_references() {
    let code = unindent(
        r#"
        record R
          Real v = 1;
        end R;
        model Q
          R r2(v = r1.v + 1);
          R r1;
          R r0(v = r2.v * 10);
        end Q;
        "#,
    );
    let mut cx = Context::new();
    cx.open_document("q.mo", &code);
    assert_eq!(value(&mut cx, "Q.r0.v"), Some(ObjectValue::Real(20.0)));
    assert_eq!(value(&mut cx, "Q.r2.v"), Some(ObjectValue::Real(2.0)));
    assert_eq!(value(&mut cx, "Q.r1.v"), Some(ObjectValue::Real(1.0)));
    assert!(cx.cycles().is_empty(), "{:?}", cx.cycles());
}

#[test]
fn parametrized_instances_refer_to_each_other() {
    let code = unindent(
        r#"
        record R
          Real v = 1;
          Real w = v * 2;
        end R;
        model Q
          R b(v = a.w + 1);
          R a(v = 3);
        end Q;
        "#,
    );
    let mut cx = Context::new();
    cx.open_document("q.mo", &code);
    assert_eq!(value(&mut cx, "Q.b.w"), Some(ObjectValue::Real(14.0)));
    assert_eq!(value(&mut cx, "Q.a.w"), Some(ObjectValue::Real(6.0)));
    let q = class(&mut cx, "Q");
    assert_eq!(cx.components(q).len(), 2);
    assert!(cx.cycles().is_empty(), "{:?}", cx.cycles());
}

#[test]
fn parametrized_self_recursion_terminates() {
    let mut cx = Context::new();
    cx.open_document("r.mo", "record R Real x; R r(x = 1); end R;");
    assert_eq!(value(&mut cx, "R.r.x"), Some(ObjectValue::Real(1.0)));
    assert!(matches!(value(&mut cx, "R.r"), Some(ObjectValue::Record(_))));
    assert!(!cx.cycles().is_empty());
}

#[test]
fn large_arrays_keep_their_shape() {
    let mut cx = Context::new();
    cx.open_document(
        "big.mo",
        "model M Real a[20000000]; Real b[3]; end M;",
    );
    let m = class(&mut cx, "M");
    assert_eq!(cx.components(m).len(), 2);
    assert!(matches!(
        value(&mut cx, "M.a"),
        Some(ObjectValue::Filled { ref shape, .. }) if shape == &[20_000_000]
    ));
    assert!(matches!(value(&mut cx, "M.b"), Some(ObjectValue::Array(ref e)) if e.len() == 3));
}

#[test]
fn array_subscripts() {
    let mut cx = Context::new();
    cx.open_document(
        "arrays.mo",
        "model M parameter Integer n = 2; Real v[n]; end M;",
    );
    let fixed = class(&mut cx, "M");
    let three = ScopeId::Class(fixed)
        .resolve(
            &mut cx,
            &Reference {
                subscripts: vec![subscript("3")],
                ..Reference::parse("Real")
            },
            false,
        )
        .and_then(NamedElement::class)
        .expect("Real[3] not resolved");
    assert_eq!(cx.class(three).identifier, "Real[3]");

    let unknown = ScopeId::Class(fixed)
        .resolve(
            &mut cx,
            &Reference {
                subscripts: vec![subscript("missing")],
                ..Reference::parse("Real")
            },
            false,
        )
        .and_then(NamedElement::class)
        .expect("Real[missing] not resolved");
    assert_eq!(cx.class(unknown).identifier, "Real[:]");

    assert_eq!(
        value(&mut cx, "M.v").map(|v| matches!(v, ObjectValue::Array(ref e) if e.len() == 2)),
        Some(true)
    );
}

fn subscript(code: &str) -> rumoca_frontend::s1_parser::ast::Subscript {
    let expr = rumoca_frontend::s1_parser::parse_expression(code).expect("Failed to parse subscript");
    rumoca_frontend::s1_parser::ast::Subscript::Expression(expr)
}

#[test]
fn default_construction_recursion() {
    let mut cx = Context::new();
    cx.open_document(
        "records.mo",
        &unindent(
            r#"
            record Inner
              Real a = 1;
              Boolean b;
            end Inner;
            record Outer
              Inner i;
              Inner j(a = 2);
              Integer k[2];
            end Outer;
            "#,
        ),
    );
    let outer = class(&mut cx, "Outer");
    let object = cx.construct(outer, None).expect("construction failed");
    assert_eq!(
        object.to_json(&cx),
        serde_json::json!({
            "@type": "Outer",
            "i": {"@type": "Inner", "a": 1.0, "b": false},
            "j": {"@type": "Inner", "a": 2.0, "b": false},
            "k": [0, 0],
        })
    );
}
