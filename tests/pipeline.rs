use qbec::{CompileError, CompileOptions, Emit, ReturnMode, Stage, compile, emit};

fn options() -> CompileOptions {
  CompileOptions::default().with_file_name("prog.q")
}

const PROGRAM: &str = r#"let greeting = "hello";
let base = 40;
let answer = add(base, 2);

fn add(a, b) {
  return a + b;
}

fn main() {
  println(greeting, answer);
  return 0;
}
"#;

#[test]
fn full_program_lowers_to_qbe() {
  let ir = compile(PROGRAM, &options()).unwrap();
  assert_eq!(
    ir,
    r#"data $greeting.bytes = { b "hello", b 0 }
data $greeting = { l $greeting.bytes }
data $base = { l 40 }
data $answer = { l 0 }

function l $add(l %p.a, l %p.b) {
@start
	%t.0 =l add %p.a, %p.b
	ret 0
@L.0
	ret 0
}

function l $main.user() {
@start
	%t.1 =l copy $str.0
	%t.2 =l loadl $greeting
	%t.3 =l loadl $answer
	call $printf(l %t.1, ..., l %t.2, l %t.3)
	%t.4 =l copy 0
	ret 0
@L.1
	ret 0
}

export function l $main() {
@start
	%t.5 =l loadl $base
	%t.6 =l copy 2
	%t.7 =l call $add(l %t.5, l %t.6)
	storel %t.7, $answer
	%t.8 =l call $main.user()
	ret %t.8
}

data $str.0 = { b "%d %d\n", b 0 }
"#
  );
}

#[test]
fn return_values_mode_returns_computed_results() {
  let options = options().with_return_mode(ReturnMode::Value);
  let ir = compile(PROGRAM, &options).unwrap();
  assert!(ir.contains("\t%t.0 =l add %p.a, %p.b\n\tret %t.0\n"));
}

#[test]
fn emit_stops_at_requested_stage() {
  let tokens = emit("let a = 1;", &options(), Emit::Tokens).unwrap();
  assert_eq!(tokens.lines().count(), 5);
  assert!(tokens.starts_with("[Keyword]\t\"let\""));

  let tree = emit("let a = 1;", &options(), Emit::Ast).unwrap();
  assert_eq!(tree, "LetStmt: a\n  IntExpr: 1\n");
}

#[test]
fn ast_stage_does_not_require_main() {
  assert!(emit("let a = b;", &options(), Emit::Ast).is_ok());
  assert!(compile("let a = 1;", &options()).is_err());
}

#[test]
fn diagnostics_carry_stage_and_position() {
  let cases = [
    ("let a = 1 @ 2;", Stage::Lexer, "[LEXER] prog.q:1:11: unexpected character '@' (ASCII: 64)"),
    ("let a = ;", Stage::Parser, "[PARSER] prog.q:1:9: expected expression near ';'"),
    (
      "fn main() {\n  println(y);\n}",
      Stage::Codegen,
      "[CODEGEN] prog.q:2:11: undefined variable with 'y'",
    ),
    ("let x = 1;", Stage::Codegen, "[CODEGEN] prog.q: mandatory function not found with 'main'"),
  ];

  for (src, stage, rendered) in cases {
    let err = compile(src, &options()).unwrap_err();
    assert_eq!(err.stage(), stage, "{src}");
    assert_eq!(err.render("prog.q"), rendered);
  }
}

#[test]
fn first_error_halts_the_pipeline() {
  // The lexer error wins even though the program also lacks `main`.
  let err = compile("let a = \"open", &options()).unwrap_err();
  assert!(matches!(err, CompileError::UnterminatedString { .. }));
}

#[test]
fn compilation_is_deterministic() {
  assert_eq!(
    compile(PROGRAM, &options()).unwrap(),
    compile(PROGRAM, &options()).unwrap()
  );
}
