use super::build::truncate_sql_bytes;
use super::cte::{dedent, indent};
use super::*;
use crate::dialect::{Dialect, ParamStyle};
use crate::error::{CteError, CteResult};
use crate::params::Parameters;
use crate::query::{Query, q};
use crate::value::Value;

fn named(p: &Parameters, key: &str) -> crate::params::ParameterPlaceholder {
    p.get(key).unwrap()
}

#[test]
fn renders_dependencies_as_ctes() {
    let q1 = q("select 1").finish().unwrap();
    let q2 = q("select 2 join ").push_query(&q1).finish().unwrap();

    let rendered = q2.build().unwrap();
    assert_eq!(
        rendered.sql(),
        "with\n_subQuery0 as (\n\tselect 1\n)\nselect 2 join _subQuery0"
    );
    assert!(rendered.parameters().is_empty());
    assert!(rendered.parameter_names().is_empty());
}

#[test]
fn without_dependencies_the_root_is_emitted_as_is() {
    let rendered = q("\n    select 1  \n").finish().unwrap().build().unwrap();
    assert_eq!(rendered.sql(), "\n    select 1  \n");
}

#[test]
fn cte_bodies_are_dedented_and_indented() {
    let dep = q("\n    select a,\n      b\n\n    from t\n").finish().unwrap();
    let root = q("\n  select *\n  from ").push_query(&dep).finish().unwrap();

    let rendered = root.build().unwrap();
    assert_eq!(
        rendered.sql(),
        "with\n_subQuery0 as (\n\tselect a,\n\t  b\n\n\tfrom t\n)\nselect *\nfrom _subQuery0"
    );
}

#[test]
fn shared_dependency_is_emitted_once() {
    let shared = Query::from_sql("select 1");
    let a = q("select * from ").push_query(&shared).finish().unwrap();
    let b = q("select * from ").push_query(&shared).finish().unwrap();
    let root = q("select * from ")
        .push_query(&a)
        .push(" join ")
        .push_query(&b)
        .push(" join ")
        .push_query(&shared)
        .finish()
        .unwrap();

    let sql = root.build().unwrap().sql().to_string();
    assert_eq!(sql.matches("select 1").count(), 1);
    assert!(sql.starts_with("with\n_subQuery0 as (\n\tselect 1\n),\n_subQuery1 as ("));
    assert!(sql.ends_with("select * from _subQuery1 join _subQuery2 join _subQuery0"));
}

#[test]
fn numbered_styles_reuse_named_parameters() {
    let p = Parameters::from_pairs([("a", 7)]).unwrap();
    let query = q("select ")
        .push_param(&named(&p, "a"))
        .push(" where x = ")
        .push_param(&named(&p, "a"))
        .finish()
        .unwrap();

    let rendered = query.build().unwrap();
    assert_eq!(rendered.sql(), "select :1 where x = :1");
    assert_eq!(rendered.parameters(), &[Value::from(7)]);
    assert_eq!(rendered.parameter_names(), &[Some("a".to_string())]);

    let dollar = query
        .build_with(&BuildOptions::new().dialect(Dialect::POSTGRES))
        .unwrap();
    assert_eq!(dollar.sql(), "select $1 where x = $1");
}

#[test]
fn qmark_never_reuses_slots() {
    let p = Parameters::from_pairs([("a", 7)]).unwrap();
    let query = q("select ")
        .push_param(&named(&p, "a"))
        .push(", ")
        .push_param(&named(&p, "a"))
        .dialect(Dialect::SQLITE)
        .finish()
        .unwrap();

    let rendered = query.build().unwrap();
    assert_eq!(rendered.sql(), "select ?, ?");
    assert_eq!(rendered.parameters(), &[Value::from(7), Value::from(7)]);
}

#[test]
fn same_key_from_different_parameter_sets_gets_separate_slots() {
    let p1 = Parameters::from_pairs([("k", 1)]).unwrap();
    let p2 = Parameters::from_pairs([("k", 2)]).unwrap();
    let query = q("select ")
        .push_param(&named(&p1, "k"))
        .push(", ")
        .push_param(&named(&p2, "k"))
        .finish()
        .unwrap();

    let rendered = query.build().unwrap();
    assert_eq!(rendered.sql(), "select :1, :2");
    assert_eq!(rendered.parameters(), &[Value::from(1), Value::from(2)]);
}

#[test]
fn collections_expand_to_one_slot_per_element() {
    let mut p = Parameters::new();
    let ids = p.add_named("ids", vec![1, 2, 3]).unwrap();
    let query = q("select * from t where id in ")
        .push_param(&ids)
        .push(" or parent in ")
        .push_param(&ids)
        .finish()
        .unwrap();

    let rendered = query.build().unwrap();
    assert_eq!(
        rendered.sql(),
        "select * from t where id in ( :1,:2,:3 ) or parent in ( :1,:2,:3 )"
    );
    assert_eq!(rendered.parameters().len(), 3);
    assert_eq!(rendered.parameter_names(), &[None::<String>, None, None]);

    let qmark = query
        .build_with(&BuildOptions::new().dialect(Dialect::SQLITE))
        .unwrap();
    assert_eq!(qmark.parameters().len(), 6);
}

#[test]
fn empty_collection_renders_null_without_a_slot() {
    let mut p = Parameters::new();
    let none = p.add_named("none", Vec::<i32>::new()).unwrap();
    let query = q("select * from t where id in ").push_param(&none).finish().unwrap();

    let rendered = query.build().unwrap();
    assert_eq!(rendered.sql(), "select * from t where id in ( NULL )");
    assert!(rendered.parameters().is_empty());
}

#[test]
fn value_order_follows_the_final_sql() {
    let mut p = Parameters::new();
    let outer = p.add_named("outer", "o").unwrap();
    let inner = p.add("i").unwrap();
    let dep = q("select ").push_param(&inner).finish().unwrap();
    let root = q("select ")
        .push_param(&outer)
        .push(" from ")
        .push_query(&dep)
        .finish()
        .unwrap();

    let rendered = root.build().unwrap();
    assert_eq!(
        rendered.sql(),
        "with\n_subQuery0 as (\n\tselect :1\n)\nselect :2 from _subQuery0"
    );
    assert_eq!(rendered.parameters(), &[Value::from("i"), Value::from("o")]);
    assert_eq!(rendered.parameter_names(), &[None, Some("outer".to_string())]);
}

#[test]
fn reparameterized_build_keeps_the_sql() {
    let p = Parameters::from_pairs([("k", Value::from(1)), ("ids", Value::from(vec![1, 2]))])
        .unwrap();
    let query = q("select ")
        .push_param(&named(&p, "k"))
        .push(" where id in ")
        .push_param(&named(&p, "ids"))
        .finish()
        .unwrap();

    let original = query.build().unwrap();
    let rebuilt = query
        .build_with(&BuildOptions::new().param("k", 10).param("ids", vec![3, 4]))
        .unwrap();

    assert_eq!(original.sql(), rebuilt.sql());
    assert_eq!(original.parameters()[0], Value::from(1));
    assert_eq!(
        rebuilt.parameters(),
        &[Value::from(10), Value::from(3), Value::from(4)]
    );

    let err = query
        .build_with(&BuildOptions::new().param("ids", vec![1, 2, 3]))
        .unwrap_err();
    assert!(matches!(err, CteError::LengthMismatch { .. }));

    let err = query
        .build_with(&BuildOptions::new().param("missing", 1))
        .unwrap_err();
    assert!(matches!(err, CteError::ParamNotFound(_)));
}

#[test]
fn key_name_style_renders_parameter_names() {
    let mut p = Parameters::new();
    let x = p.add_named("x", 1).unwrap();
    let query = q("return ").push_param(&x).push(" + ").push_param(&x).finish().unwrap();

    let options = BuildOptions::new().overrides(Overrides::new().param_style(KeyName));
    let rendered = query.build_with(&options).unwrap();
    assert_eq!(rendered.sql(), "return x + x");

    let anonymous = p.add(2).unwrap();
    let query = q("return ").push_param(&anonymous).finish().unwrap();
    assert!(query.build_with(&options).unwrap_err().is_config());
}

#[test]
fn query_overrides_apply_unless_the_build_overrides_them() {
    #[derive(Debug)]
    struct Upper;

    impl QueryRenderer for Upper {
        fn render(&self, query: &Query, params: &mut ParamRenderer) -> CteResult<String> {
            Ok(CteRenderer.render(query, params)?.to_uppercase())
        }
    }

    let query = q("select 1")
        .overrides(Some(Overrides::new().query_renderer(Upper)))
        .finish()
        .unwrap();
    assert_eq!(query.build().unwrap().sql(), "SELECT 1");

    let plain = query
        .build_with(&BuildOptions::new().overrides(Overrides::new()))
        .unwrap();
    assert_eq!(plain.sql(), "select 1");
}

#[test]
fn paramstyle_maps_to_placeholder_styles() {
    let cases = [
        (ParamStyle::Qmark, "?"),
        (ParamStyle::Numeric, ":3"),
        (ParamStyle::NumericDollar, "$3"),
    ];
    for (style, expected) in cases {
        let rendered = style.placeholder_style().placeholder(2, None).unwrap();
        assert_eq!(rendered, expected);
    }
}

#[test]
fn with_param_rebinds_named_slots() {
    let p = Parameters::from_pairs([("a", 1), ("b", 2)]).unwrap();
    let query = q("select ")
        .push_param(&named(&p, "a"))
        .push(", ")
        .push_param(&named(&p, "b"))
        .finish()
        .unwrap();

    let rendered = query.build().unwrap().with_param("b", 20).unwrap();
    assert_eq!(rendered.parameters(), &[Value::from(1), Value::from(20)]);
    assert_eq!(rendered.params_ref().len(), 2);

    let err = rendered.clone().with_param("zzz", 1).unwrap_err();
    assert!(matches!(err, CteError::ParamNotFound(_)));
    assert!(rendered.with_param("a", vec![1, 2]).is_err());
}

#[test]
fn truncate_sql_bytes_respects_char_boundaries() {
    assert_eq!(truncate_sql_bytes("select", 10), "select");
    assert_eq!(truncate_sql_bytes("select", 3), "sel");
    // 'é' is two bytes.
    assert_eq!(truncate_sql_bytes("é", 1), "");
}

#[test]
fn dedent_ignores_blank_lines() {
    assert_eq!(dedent("  a\n\n    b\n  "), "a\n\n  b\n");
    assert_eq!(dedent("\ta\n  b"), "\ta\n  b");
    assert_eq!(indent("a\n\nb", "\t"), "\ta\n\n\tb");
}
