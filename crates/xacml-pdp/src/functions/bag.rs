// bag.rs - Per-datatype bag and set functions.
//
// Bag functions: -one-and-only, -bag-size, -is-in, -bag.
// Set functions: -intersection, -at-least-one-member-of, -union, -subset,
// -set-equals. Set functions treat bags as sets: results carry no
// duplicates and multiplicity never matters.

use xacml_model::{AttributeValue, Bag, Datatype, IndeterminateError, Value, ValueType};

use super::{bag_arg, bag_of, boolean, one, prefix_for, single_arg, FirstOrderFunction, FunctionRegistry};

fn bag_function_types() -> impl Iterator<Item = Datatype> {
    Datatype::STANDARD.into_iter()
}

fn set_function_types() -> impl Iterator<Item = Datatype> {
    Datatype::STANDARD
        .into_iter()
        .filter(|dt| !matches!(dt, Datatype::IpAddress | Datatype::DnsName))
}

fn make_bag(datatype: &Datatype, args: &[Value]) -> Result<Value, IndeterminateError> {
    let mut bag = Bag::empty(datatype.clone());
    for i in 0..args.len() {
        bag.push(single_arg(args, i)?.clone())?;
    }
    Ok(Value::Bag(bag))
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for datatype in bag_function_types() {
        let prefix = prefix_for(&datatype);
        let name = datatype.short_name().to_string();

        registry.add(FirstOrderFunction::new(
            format!("{}{}-one-and-only", prefix, name),
            vec![bag_of(datatype.clone())],
            one(datatype.clone()),
            |args| {
                let bag = bag_arg(args, 0)?;
                bag.one_and_only()
                    .cloned()
                    .map(Value::Single)
                    .ok_or_else(|| {
                        IndeterminateError::processing(format!(
                            "expected a bag of exactly one value, found {}",
                            bag.len()
                        ))
                    })
            },
        ));
        registry.add(FirstOrderFunction::new(
            format!("{}{}-bag-size", prefix, name),
            vec![bag_of(datatype.clone())],
            one(Datatype::Integer),
            |args| Ok(Value::Single(AttributeValue::integer(bag_arg(args, 0)?.len()))),
        ));
        registry.add(FirstOrderFunction::new(
            format!("{}{}-is-in", prefix, name),
            vec![one(datatype.clone()), bag_of(datatype.clone())],
            ValueType::boolean(),
            |args| Ok(boolean(bag_arg(args, 1)?.contains(single_arg(args, 0)?))),
        ));
        let element = datatype.clone();
        registry.add(FirstOrderFunction::variadic(
            format!("{}{}-bag", prefix, name),
            vec![],
            one(datatype.clone()),
            0,
            bag_of(datatype),
            move |args| make_bag(&element, args),
        ));
    }

    for datatype in set_function_types() {
        let prefix = prefix_for(&datatype);
        let name = datatype.short_name().to_string();
        let pair = || vec![bag_of(datatype.clone()), bag_of(datatype.clone())];

        registry.add(FirstOrderFunction::new(
            format!("{}{}-intersection", prefix, name),
            pair(),
            bag_of(datatype.clone()),
            |args| Ok(Value::Bag(bag_arg(args, 0)?.intersection(bag_arg(args, 1)?))),
        ));
        registry.add(FirstOrderFunction::new(
            format!("{}{}-at-least-one-member-of", prefix, name),
            pair(),
            ValueType::boolean(),
            |args| Ok(boolean(bag_arg(args, 0)?.at_least_one_member_of(bag_arg(args, 1)?))),
        ));
        registry.add(FirstOrderFunction::variadic(
            format!("{}{}-union", prefix, name),
            vec![],
            bag_of(datatype.clone()),
            2,
            bag_of(datatype.clone()),
            |args| {
                let mut union = bag_arg(args, 0)?.distinct();
                for i in 1..args.len() {
                    union = union.union(bag_arg(args, i)?);
                }
                Ok(Value::Bag(union))
            },
        ));
        registry.add(FirstOrderFunction::new(
            format!("{}{}-subset", prefix, name),
            pair(),
            ValueType::boolean(),
            |args| Ok(boolean(bag_arg(args, 0)?.is_subset_of(bag_arg(args, 1)?))),
        ));
        registry.add(FirstOrderFunction::new(
            format!("{}{}-set-equals", prefix, name),
            pair(),
            ValueType::boolean(),
            |args| Ok(boolean(bag_arg(args, 0)?.set_equals(bag_arg(args, 1)?))),
        ));
    }
}
