mod common;

use common::{chars, ints, run};

use hatch_vm::Output;

#[test]
fn array_with_mixed_elements_and_mutation() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int x = 52;\n\
             let int[5] a = [51, x, 53, 54, 55];\n\
             a[4] = 60;\n\
             a[0] = 0;\n\
             for (let int i = 0; i < 5; i = i + 1) { io.print(a[i]); }\n\
         }",
    );
    assert_eq!(ints(&[0, 52, 53, 54, 60]), output);
}

#[test]
fn literal_arrays_copy_from_the_data_section() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int[4] a = [11, 12, 13, 14];\n\
             for (let int i = 0; i < 4; i = i + 1) { io.print(a[i]); }\n\
         }",
    );
    assert_eq!(ints(&[11, 12, 13, 14]), output);
}

#[test]
fn arrays_pass_by_value() {
    let output = run(
        "import io;\n\
         function int sum(int[] numbers) {\n\
             let int total = 0;\n\
             for (let int i = 0; i < numbers; i = i + 1) {\n\
                 total = total + numbers[i];\n\
             }\n\
             return total;\n\
         }\n\
         function void main() {\n\
             let int[2] numbers = [5, 6];\n\
             io.print(sum(numbers));\n\
             io.print(sum([25, 8]));\n\
             io.print(numbers[0]);\n\
         }",
    );
    assert_eq!(ints(&[11, 33, 5]), output);
}

#[test]
fn computed_indices_walk_the_aggregate() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int[3] a = [10, 20, 30];\n\
             let int i = 1;\n\
             io.print(a[i]);\n\
             io.print(a[i + 1]);\n\
             a[i + 1] = 31;\n\
             io.print(a[2]);\n\
         }",
    );
    assert_eq!(ints(&[20, 30, 31]), output);
}

#[test]
fn strings_print_and_index() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let string hello = \"Hello, world!\\n\";\n\
             io.print(hello);\n\
             io.print(hello[1]);\n\
         }",
    );
    assert_eq!(chars("Hello, world!\ne"), output);
}

#[test]
fn struct_member_read_and_write() {
    let output = run(
        "import io;\n\
         struct Car {\n\
             int wheels,\n\
             int seats,\n\
         }\n\
         function int wheels_plus_seats(Car car) {\n\
             return car.wheels + car.seats;\n\
         }\n\
         function void main() {\n\
             let int wheels = 4;\n\
             let Car ford = new Car(wheels, 5);\n\
             io.print(ford.wheels);\n\
             io.print(ford.seats);\n\
             io.print(wheels_plus_seats(ford));\n\
             io.print(ford.wheels == 4);\n\
             ford.seats = 7;\n\
             io.print(ford.seats);\n\
         }",
    );
    let mut expected = ints(&[4, 5, 9]);
    expected.extend(chars("true"));
    expected.extend(ints(&[7]));
    assert_eq!(expected, output);
}

#[test]
fn boolean_prints_spell_out_false_too() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let int x = 3;\n\
             io.print(x == 4);\n\
         }",
    );
    assert_eq!(chars("false"), output);
}

#[test]
fn comparing_an_int_against_an_array_reads_its_length() {
    let output = run(
        "import io;\n\
         function void main() {\n\
             let string s = \"abc\";\n\
             let int n = 0;\n\
             while (n < s) { n = n + 1; }\n\
             io.print(n);\n\
         }",
    );
    assert_eq!(vec![Output::Int(3)], output);
}
