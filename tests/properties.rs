//! Property tests over generated function bodies.

use debugweave::scan::brace_balance;
use debugweave::{instrument_source, Config, FunctionStatus};
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &[
    "int y = 1;",
    "char *p = s;",
    "x = a + 1;",
    "foo(x);",
    "if (a) return 1;",
    "if (a) { return 2; }",
    "if (a)\n        x++;",
    "while (a--) {\n        bar(a);\n    }",
    "return x;",
    "s = \"{ not a brace\";",
    "/* } */",
    "// {",
    "switch (a) {\n    case 1:\n        x = 2;\n        break;\n    default:\n        break;\n    }",
    "struct pt q = { 1, 2 };",
    "#ifdef FEATURE\n    y();\n#endif",
    "do {\n        x--;\n    } while (x > 0);",
    "c = '}';",
    "if (a) {\n        x = 3;\n    } else {\n        x = 4;\n    }",
];

fn body() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..10).prop_map(|parts| {
        let mut src = String::from("int f(int a, char *s) {\n    int x = 0;\n    char c = 'a';\n");
        for part in parts {
            src.push_str("    ");
            src.push_str(part);
            src.push('\n');
        }
        src.push_str("}\n");
        src
    })
}

fn full_config() -> Config {
    let mut config = Config::default();
    config.control = true;
    config
}

proptest! {
    #[test]
    fn prop_brace_balance_preserved(src in body()) {
        let result = instrument_source(&src, &full_config());
        prop_assert_eq!(brace_balance(&result.text), brace_balance(&src));
    }

    #[test]
    fn prop_idempotent(src in body()) {
        let config = full_config();
        let once = instrument_source(&src, &config);
        let twice = instrument_source(&once.text, &config);
        prop_assert_eq!(&once.text, &twice.text);
        prop_assert_eq!(twice.report.count(FunctionStatus::Instrumented), 0);
    }

    #[test]
    fn prop_nothing_before_leading_declarations(src in body()) {
        let result = instrument_source(&src, &full_config());
        let decl = result.text.find("    char c = 'a';\n").unwrap();
        if let Some(marker) = result.text.find("#EXTRA_DEBUG_PRINTS") {
            prop_assert!(marker > decl);
        }
    }

    #[test]
    fn prop_source_lines_survive(src in body()) {
        // Every original line is still present, in order
        let result = instrument_source(&src, &full_config());
        let out: Vec<&str> = result.text.lines().map(str::trim).collect();
        let mut pos = 0;
        for line in src.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.contains("return") && !line.starts_with("return") {
                // Single-line guarded blocks may be split
                continue;
            }
            match out[pos..].iter().position(|l| *l == line) {
                Some(found) => pos += found + 1,
                None => prop_assert!(false, "line {:?} lost:\n{}", line, result.text),
            }
        }
    }
}
