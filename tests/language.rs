//! End-to-end language tests: feed a program through a captured output sink
//! and compare what `print` wrote.

use std::cell::RefCell;
use std::rc::Rc;

use indoc::indoc;
use squirt::error::Error;
use squirt::runtime::default_namespace;
use squirt::runtime::error::OpError;
use squirt::runtime::scope::ScopeRef;
use squirt::runtime::table::Table;
use squirt::runtime::value::Value;

fn run(source: &str) -> Result<String, Error> {
    let sink = Rc::new(RefCell::new(Vec::<u8>::new()));
    let scope = default_namespace(Some(sink.clone()));
    squirt::eval_str(&scope, source)?;
    let bytes = sink.borrow().clone();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn output(source: &str) -> String {
    run(source).expect("program should run")
}

fn runtime_error(source: &str) -> squirt::error::RuntimeError {
    match run(source) {
        Err(Error::Runtime(err)) => err,
        Err(other) => panic!("expected runtime error, got: {other}"),
        Ok(out) => panic!("expected runtime error, program printed: {out:?}"),
    }
}

#[test]
fn fibonacci() {
    let source = indoc! {"
        func fib(n) if n < 2 then return n end return fib(n-1) + fib(n-2) end
        print(fib(10))
    "};
    assert_eq!(output(source), "55\n");
}

#[test]
fn multi_assign_collects_tail_into_last_target() {
    assert_eq!(
        output("a, b = 1, 2, 3, 4 print(a) print(b)"),
        "1\n{2, 3, 4}\n"
    );
}

#[test]
fn multi_assign_fills_missing_targets_with_nil() {
    assert_eq!(output("a, b, c = 1 print(a, b, c)"), "1 nil nil\n");
}

#[test]
fn multi_assign_expands_spreads() {
    assert_eq!(
        output("t = {2, 3} a, b, c = 1, t... print(a, b, c)"),
        "1 2 3\n"
    );
}

#[test]
fn string_interpolation() {
    assert_eq!(output(r#"x = 5  print("x is ${x * 2}")"#), "x is 10\n");
}

#[test]
fn interpolation_reaches_enclosing_scope() {
    let source = indoc! {r#"
        func greet(name) return "hi ${name}!" end
        print(greet("ada"))
        print("${1 + 2}${3 * 2}")
    "#};
    assert_eq!(output(source), "hi ada!\n36\n");
}

#[test]
fn class_inheritance_and_override() {
    let source = indoc! {r#"
        class Animal do func speak() return "?" end end
        class Dog isa Animal do func speak() return "woof" end end
        print(new(Dog).speak())
    "#};
    assert_eq!(output(source), "woof\n");
}

#[test]
fn method_lookup_falls_through_to_parent() {
    let source = indoc! {r#"
        class Animal do func speak() return "generic" end end
        class Cat isa Animal do end
        print(new(Cat).speak())
    "#};
    assert_eq!(output(source), "generic\n");
}

#[test]
fn super_calls_parent_method() {
    let source = indoc! {r#"
        class Animal do func speak() return "animal" end end
        class Dog isa Animal do
          func speak() return super() + " then woof" end
        end
        print(new(Dog).speak())
    "#};
    assert_eq!(output(source), "animal then woof\n");
}

#[test]
fn classes_are_directly_callable() {
    let source = indoc! {r#"
        class Dog do func speak() return "woof" end end
        print(Dog().speak())
    "#};
    assert_eq!(output(source), "woof\n");
}

#[test]
fn constructor_receives_arguments() {
    let source = indoc! {r#"
        class Point do
          attr x = 0
          attr y = 0
          func new(x, y)
            self.x = x
            self.y = y
          end
          func sum() return self.x + self.y end
        end
        p = new(Point, 3, 4)
        print(p.sum())
    "#};
    assert_eq!(output(source), "7\n");
}

#[test]
fn construction_copies_table_arguments_without_a_constructor() {
    let source = indoc! {r#"
        class Config do
          attr host = "localhost"
          attr port = 0
        end
        c = new(Config, {host: "example.com", port: 8080})
        print(c.host)
        print(c.port)
    "#};
    assert_eq!(output(source), "example.com\n8080\n");
}

#[test]
fn cleanup_catches_subclass() {
    let source = indoc! {r#"
        func boom() spill(ArgumentError, "bad") end
        do boom() cleanup e = Error do print("got: " + e.message) end
    "#};
    assert_eq!(output(source), "got: bad\n");
}

#[test]
fn first_matching_cleanup_wins() {
    let source = indoc! {r#"
        do
          spill(ArgumentError, "specific")
        cleanup e = ArgumentError do
          print("argument: " + e.message)
        cleanup e = Error do
          print("generic: " + e.message)
        end
    "#};
    assert_eq!(output(source), "argument: specific\n");
}

#[test]
fn cleanup_attaches_to_function_bodies() {
    let source = indoc! {r#"
        func risky()
          spill("inside")
          return "unreached"
        cleanup e = Error do
          return "recovered: " + e.message
        end
        print(risky())
    "#};
    assert_eq!(output(source), "recovered: inside\n");
}

#[test]
fn try_operator_yields_error_or_value() {
    let source = indoc! {r#"
        err, v = @spill("x")
        print(typeof(err))
        err, v = @(2 + 3)
        print(typeof(err), v)
    "#};
    assert_eq!(output(source), "RuntimeError\nNil 5\n");
}

#[test]
fn spill_reraises_error_instances() {
    let source = indoc! {r#"
        e = new(ArgumentError, "original")
        do
          spill(e)
        cleanup caught = ArgumentError do
          print(caught.message)
        end
    "#};
    assert_eq!(output(source), "original\n");
}

#[test]
fn uncaught_errors_report_class_and_message() {
    let err = runtime_error(r#"spill(ArgumentError, "fatal")"#);
    assert_eq!(err.class_name, "ArgumentError");
    assert_eq!(err.message, "fatal");
    let rendered = err.to_string();
    assert!(rendered.contains("ArgumentError: fatal"), "{rendered}");
}

#[test]
fn scope_assignment_mutates_outer_binding() {
    let source = indoc! {"
        x = 1
        func bump() x = x + 1 end
        bump()
        bump()
        print(x)
    "};
    assert_eq!(output(source), "3\n");
}

#[test]
fn arithmetic_follows_ieee_and_truncating_shifts() {
    assert_eq!(output("print(0.1 + 0.2)"), "0.30000000000000004\n");
    assert_eq!(output("print(2 ^ 10)"), "1024\n");
    assert_eq!(output("print(7 % 2)"), "1\n");
    assert_eq!(output("print(5.9 << 1)"), "10\n");
    assert_eq!(output("print(12 >> 2)"), "3\n");
    assert_eq!(output("print(12 & 10, 12 | 10, 12 ~ 10)"), "8 14 6\n");
    assert_eq!(output("print(-5 + 2)"), "-3\n");
    assert_eq!(output("print(~0)"), "-1\n");
}

#[test]
fn comparisons_and_equality() {
    assert_eq!(output("print(1 < 2, 2 <= 2, 3 > 4, 4 >= 4)"), "true true false true\n");
    assert_eq!(output(r#"print(1 == 1, 1 != 2, "a" == "a")"#), "true true true\n");
}

#[test]
fn ternary_and_unary_not() {
    assert_eq!(output("print(1 < 2 ? \"yes\" : \"no\")"), "yes\n");
    assert_eq!(output("print(!true, !nil)"), "false true\n");
}

#[test]
fn string_length_slicing_and_splice() {
    assert_eq!(output(r#"print(#"hello")"#), "5\n");
    assert_eq!(output(r#"s = "hello world" print(s[0:5])"#), "hello\n");
    assert_eq!(output(r#"s = "hello" print(s[1])"#), "e\n");
    assert_eq!(
        output(r#"s = "hello world" s[0:5] = "howdy" print(s)"#),
        "howdy world\n"
    );
}

#[test]
fn table_constructor_indexing_and_length() {
    let source = indoc! {r#"
        t = {1, 2, name: "box", [3]: "third"}
        print(#t)
        print(t[0], t[1])
        print(t["name"])
        print(t.name)
        print(t[3])
    "#};
    assert_eq!(output(source), "4\n1 2\nbox\nbox\nthird\n");
}

#[test]
fn table_merge_difference_append_and_delete() {
    let source = indoc! {r#"
        a = {1, 2, x: 1}
        b = {2, y: 2}
        print(a + b)
        print(a - b)
        a << 9
        print(a[#a - 1])
        delete(a, "x")
        print(a)
    "#};
    assert_eq!(
        output(source),
        "{1, 2, 2, x: 1, y: 2}\n{1, x: 1}\n9\n{1, 2, 9}\n"
    );
}

#[test]
fn table_equality_is_identity() {
    let source = indoc! {"
        a = {1, 2}
        b = {1, 2}
        c = a
        print(a == b)
        print(a == c)
    "};
    assert_eq!(output(source), "false\ntrue\n");
}

#[test]
fn for_in_walks_array_part_then_keys() {
    let source = indoc! {r#"
        t = {"a", "b", k: "c"}
        for key, val in t do
          print(key, val)
        end
    "#};
    assert_eq!(output(source), "0 a\n1 b\nk c\n");
}

#[test]
fn loops_support_break_and_next() {
    let source = indoc! {"
        for i = 0, i < 10, i += 1 do
          if i == 1 then next end
          if i == 3 then break end
          print(i)
        end
        total = 0
        for k, v in {5, 6, 7} do
          if v == 6 then next end
          total += v
        end
        print(total)
    "};
    assert_eq!(output(source), "0\n2\n12\n");
}

#[test]
fn shortcut_assignment_operators() {
    let source = indoc! {"
        x = 1
        x += 4
        x -= 2
        x ++
        x --
        print(x)
    "};
    assert_eq!(output(source), "3\n");
}

#[test]
fn variadic_functions_collect_tail_arguments() {
    let source = indoc! {r#"
        func tally(first, rest...)
          total = first
          for i, v in rest do
            total += v
          end
          return total
        end
        print(tally(1, 2, 3, 4))
    "#};
    assert_eq!(output(source), "10\n");
}

#[test]
fn functions_return_multiple_values() {
    let source = indoc! {"
        func pair() return 1, 2 end
        a, b = pair()
        print(a, b)
    "};
    assert_eq!(output(source), "1 2\n");
}

#[test]
fn functions_are_first_class_closures() {
    let source = indoc! {"
        func make_counter()
          count = 0
          return func() count += 1 return count end
        end
        tick = make_counter()
        tick()
        print(tick())
    "};
    assert_eq!(output(source), "2\n");
}

#[test]
fn dotted_function_names_assign_members() {
    let source = indoc! {"
        box = {}
        func box.describe() return 42 end
        print(box.describe())
    "};
    assert_eq!(output(source), "42\n");
}

#[test]
fn private_attributes_reject_external_access() {
    let err = runtime_error(indoc! {"
        class Safe do
          attr _secret = 7
        end
        print(new(Safe)._secret)
    "});
    assert!(
        err.message.contains("tried to access private attribute _secret"),
        "{}",
        err.message
    );
}

#[test]
fn private_attributes_visible_through_self() {
    let source = indoc! {"
        class Safe do
          attr _secret = 7
          func reveal() return self._secret end
        end
        print(new(Safe).reveal())
    "};
    assert_eq!(output(source), "7\n");
}

#[test]
fn static_attributes_live_on_the_class() {
    let source = indoc! {r#"
        class Counter do
          attr Label = "counter"
        end
        print(Counter.Label)
    "#};
    assert_eq!(output(source), "counter\n");
}

#[test]
fn constant_refinement_blocks_assignment() {
    let err = runtime_error(indoc! {"
        class Fixed do
          attr limit = 10, { const: true }
        end
        f = new(Fixed)
        f.limit = 20
    "});
    assert!(
        err.message.contains("cannot assign to constant attribute limit"),
        "{}",
        err.message
    );
}

#[test]
fn type_refinement_checks_assigned_values() {
    let err = runtime_error(indoc! {r#"
        class Sized do
          attr size = 0, { type: Number }
        end
        s = new(Sized)
        s.size = "big"
    "#});
    assert!(
        err.message.contains("incorrect type String passed to attribute size"),
        "{}",
        err.message
    );
}

#[test]
fn required_refinement_enforced_after_construction() {
    let err = runtime_error(indoc! {"
        class Job do
          attr name = nil, { required: true }
        end
        new(Job)
    "});
    assert!(
        err.message.contains("required attribute name was not given a value"),
        "{}",
        err.message
    );

    let source = indoc! {r#"
        class Job do
          attr name = nil, { required: true }
        end
        j = new(Job, {name: "build"})
        print(j.name)
    "#};
    assert_eq!(output(source), "build\n");
}

#[test]
fn getter_refinement_redirects_external_reads() {
    let source = indoc! {r#"
        class Wrapped do
          attr value = 1, { get: "reveal" }
          func reveal() return 42 end
        end
        print(new(Wrapped).value)
    "#};
    assert_eq!(output(source), "42\n");
}

#[test]
fn inherited_constants_stay_constant() {
    let err = runtime_error(indoc! {"
        class Base do
          attr limit = 1, { const: true }
        end
        class Child isa Base do end
        c = new(Child)
        c.limit = 2
    "});
    assert!(
        err.message.contains("cannot assign to constant attribute limit"),
        "{}",
        err.message
    );
}

#[test]
fn isa_checks_walk_the_parent_chain() {
    let source = indoc! {r#"
        class Animal do end
        class Dog isa Animal do end
        d = new(Dog)
        print(typeof(d))
        do
          spill(ArgumentError, "x")
        cleanup e = Error do
          print(typeof(e))
        end
    "#};
    assert_eq!(output(source), "Dog\nArgumentError\n");
}

#[test]
fn typeof_reports_builtin_classes() {
    assert_eq!(
        output(r#"print(typeof(1), typeof("s"), typeof(true), typeof(nil), typeof({}))"#),
        "Number String Boolean Nil Table\n"
    );
}

#[test]
fn tostring_and_tonumber_builtins() {
    assert_eq!(output("print(tostring(12) + \"!\")"), "12!\n");
    assert_eq!(output("print(tonumber(\"3.5\") + 1)"), "4.5\n");
    assert_eq!(output("print(tonumber(\"nope\"))"), "0\n");
}

#[test]
fn eval_builtin_shares_the_calling_scope() {
    let source = indoc! {r#"
        x = 1
        eval("x = x + 41")
        print(x)
    "#};
    assert_eq!(output(source), "42\n");
}

#[test]
fn registered_libs_load_once_and_cache() {
    fn fake_lib(scope: &ScopeRef) -> Result<Value, OpError> {
        let table = Table::from_arr(vec![Value::Str("lib".to_string())]).share();
        squirt::runtime::value::to_value(scope, Value::Table(table))
    }
    squirt::register_lib("fake", fake_lib);

    let sink = Rc::new(RefCell::new(Vec::<u8>::new()));
    let scope = default_namespace(Some(sink.clone()));
    let source = indoc! {r#"
        a = require("fake")
        b = require("fake")
        print(a[0])
        print(a == b)
    "#};
    squirt::eval_str(&scope, source).expect("program should run");
    let bytes = sink.borrow().clone();
    assert_eq!(String::from_utf8_lossy(&bytes), "lib\ntrue\n");
}

#[test]
fn multiline_strings_keep_interior_newlines() {
    assert_eq!(output("print(`one\ntwo`)"), "one\ntwo\n");
}

#[test]
fn boolean_coercion_rules() {
    let source = indoc! {r#"
        func check(v) return v ? "t" : "f" end
        print(check(0), check(1), check(""), check("x"), check(nil), check({}))
    "#};
    assert_eq!(output(source), "f t f t f t\n");
}
