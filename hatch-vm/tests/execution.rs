mod common;

use common::{ints, run, run_machine};

use hatch_vm::Output;

#[test]
fn scalar_print() {
    let output = run(
        "import io;\n\
         function int main() { let int x = 5; io.print(x); }",
    );
    assert_eq!(ints(&[5]), output);
}

#[test]
fn arithmetic_operators() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int a = 7;\n\
             let int b = 6;\n\
             io.print(a * b);\n\
             io.print(50 - 8);\n\
             io.print(a / 2);\n\
         }",
    );
    assert_eq!(ints(&[42, 42, 3]), output);
}

#[test]
fn wraparound_addition() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int a = 200;\n\
             let int b = 100;\n\
             io.print(a + b);\n\
         }",
    );
    assert_eq!(ints(&[44]), output);
}

#[test]
fn recursive_triangle_number() {
    let output = run(
        "import io;\n\
         function int triangle(int n) {\n\
             if (n == 1) { return 1; } else { return n + triangle(n - 1); }\n\
         }\n\
         function int main() { io.print(triangle(5)); }",
    );
    assert_eq!(ints(&[15]), output);
}

#[test]
fn nested_call_arguments() {
    let output = run(
        "import io;\n\
         function int double(int n) { return n + n; }\n\
         function void main() { io.print(double(double(3)) + 1); }",
    );
    assert_eq!(ints(&[13]), output);
}

#[test]
fn function_values_call_through_the_stack() {
    let output = run(
        "import io;\n\
         function int increment(int b) { return b + 1; }\n\
         function int decrement(int b) { return b - 1; }\n\
         function func inc_or_dec(int inc) {\n\
             if (inc == 1) { return increment; } else { return decrement; }\n\
         }\n\
         function void main() {\n\
             let int x = 5;\n\
             x = inc_or_dec(1)(x);\n\
             io.print(x);\n\
             let int y = 22;\n\
             y = inc_or_dec(0)(y);\n\
             io.print(y);\n\
         }",
    );
    assert_eq!(ints(&[6, 21]), output);
}

#[test]
fn character_cast_round_trip() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let char c = 104c;\n\
             let int x = int(c);\n\
             io.print(x);\n\
             let char d = char(x);\n\
             io.print(d);\n\
         }",
    );
    assert_eq!(vec![Output::Int(104), Output::Char(104)], output);
}

#[test]
fn scalar_programs_leave_the_machine_clean() {
    let vm = run_machine(
        "import io;\n\
         function int add(int a, int b) { return a + b; }\n\
         function void main() {\n\
             let int x = add(2, 3);\n\
             io.print(x);\n\
             if (x > 4) { let int y = x + 1; io.print(y); }\n\
         }",
    );
    assert!(vm.data_stack().is_empty());
    assert!(vm.runtime_region_is_clear());
    assert_eq!(&ints(&[5, 6])[..], vm.output());
}

#[test]
fn early_literal_return_short_circuits() {
    let output = run(
        "import io;\n\
         function int pick(int n) {\n\
             if (n > 10) { return 1; }\n\
             return 2;\n\
         }\n\
         function void main() { io.print(pick(20)); io.print(pick(3)); }",
    );
    assert_eq!(ints(&[1, 2]), output);
}
