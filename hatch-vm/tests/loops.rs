mod common;

use common::{ints, run};

#[test]
fn for_loop_counts_to_ten() {
    let output = run(
        "import io;\n\
         function int main() {\n\
             for (let int i = 0; i < 10; i = i + 1) { io.print(i); }\n\
         }",
    );
    assert_eq!(ints(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]), output);
}

#[test]
fn while_loop_with_break_and_continue() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int i = 0;\n\
             let bool p = false;\n\
             while (true) {\n\
                 i = i + 1;\n\
                 if (i > 30) { break; }\n\
                 if (p) { io.print(i); p = false; continue; }\n\
                 p = true;\n\
             }\n\
         }",
    );
    let expected: Vec<u8> = (2..=30).step_by(2).collect();
    assert_eq!(ints(&expected), output);
}

#[test]
fn while_condition_with_postfix_increment() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int i = 0;\n\
             while (i++ < 10) {\n\
                 io.print(i);\n\
             }\n\
         }",
    );
    assert_eq!(ints(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]), output);
}

#[test]
fn postfix_increment_statement() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int i = 0;\n\
             while (i < 10) {\n\
                 i++;\n\
                 io.print(i);\n\
             }\n\
         }",
    );
    assert_eq!(ints(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]), output);
}

#[test]
fn call_in_loop_condition_with_postfix_decrement() {
    let output = run(
        "import io;\n\
         function int print_and_return(int number) {\n\
             io.print(number);\n\
             return number;\n\
         }\n\
         function void main() {\n\
             let int i = 10;\n\
             while (print_and_return(i--) > 1) {\n\
             }\n\
         }",
    );
    let expected: Vec<u8> = (1..=10).rev().collect();
    assert_eq!(ints(&expected), output);
}

#[test]
fn for_loop_with_postfix_increment_action() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             for (let int c = 100; c < 111; c++) { io.print(c); }\n\
         }",
    );
    let expected: Vec<u8> = (100..=110).collect();
    assert_eq!(ints(&expected), output);
}

#[test]
fn nested_loops_patch_their_own_breaks() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             for (let int i = 0; i < 3; i = i + 1) {\n\
                 let int j = 0;\n\
                 while (true) {\n\
                     j = j + 1;\n\
                     if (j > 2) { break; }\n\
                 }\n\
                 io.print(j);\n\
             }\n\
         }",
    );
    assert_eq!(ints(&[3, 3, 3]), output);
}

#[test]
fn while_false_emits_nothing() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             while (false) { io.print(99); }\n\
             io.print(1);\n\
         }",
    );
    assert_eq!(ints(&[1]), output);
}
