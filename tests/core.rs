use sphere_pad::autograd::{grad, no_grad, Variable};
use sphere_pad::backend::DispatchKey;
use sphere_pad::backprop::add;
use sphere_pad::ops::args::PadArgs;
use sphere_pad::ops::dispatch::{self, OpFn};
use sphere_pad::tensor;
use sphere_pad::tensors::Tensor;
use sphere_pad::PadError;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| {
        Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
    });
    assert!(result.is_err());
}

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.shape(), &[2, 2]);
    assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.ndim(), 2);
}

#[test]
fn test_tensor_macro() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape(), &[2, 2]);
    assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_add_backprop() {
    init_logger();
    let a = Variable::leaf(tensor!([2.0, 3.0]));
    let b = Variable::leaf(tensor!([4.0, 5.0]));
    let y = add(&a, &b).unwrap();
    assert_eq!(y.data().data(), &[6.0, 8.0]);

    y.backward(Some(tensor!([1.0, 0.5]))).unwrap();
    assert_eq!(a.grad().unwrap().data(), &[1.0, 0.5]);
    assert_eq!(b.grad().unwrap().data(), &[1.0, 0.5]);
}

#[test]
fn test_no_grad_records_nothing() {
    let a = Variable::leaf(tensor!([1.0]));
    let y = {
        let _guard = no_grad();
        add(&a, &a).unwrap()
    };
    assert!(y.grad_fn().is_none());
    assert!(matches!(y.backward(None), Err(PadError::NotDifferentiable(0))));
}

#[test]
fn test_detach_cuts_the_graph() {
    let a = Variable::leaf(tensor!([1.0]));
    let y = add(&a, &a).unwrap().detach();
    let z = add(&y, &a).unwrap();
    z.backward(None).unwrap();
    assert_eq!(a.grad().unwrap().data(), &[1.0]);
}

#[test]
fn test_grad_with_create_graph_is_differentiable() {
    let a = Variable::leaf(tensor!([1.0]));
    let y = add(&a, &a).unwrap();
    let seed = Variable::leaf(tensor!([1.0]));

    let grads = grad(&[y], &[seed.clone()], &[a.clone()], true).unwrap();
    let ga = grads[0].clone().unwrap();
    assert_eq!(ga.data().data(), &[2.0]);
    assert_eq!(ga.grad_fn_name(), Some("add"));

    // d(ga)/d(seed) = 2
    ga.backward(None).unwrap();
    assert_eq!(seed.grad().unwrap().data(), &[2.0]);
}

fn negate(inputs: &[&Variable], _args: &PadArgs) -> Result<Variable, PadError> {
    let [x] = inputs else {
        return Err(PadError::WrongInputCount {
            name: "core::negate".into(),
            expected: 1,
            actual: inputs.len(),
        });
    };
    let data = x.data().data().iter().map(|v| -v).collect();
    Ok(Variable::constant(Tensor::new(x.shape(), data)))
}

#[test]
fn test_custom_registration() {
    let f: OpFn = negate;
    dispatch::register_kernel("core::negate", DispatchKey::Cpu, f);
    assert!(dispatch::is_registered("core::negate", DispatchKey::Cpu));
    assert!(!dispatch::is_registered("core::negate", DispatchKey::Autograd));

    let x = Variable::constant(tensor!([1.0, -2.0]));
    let y = dispatch::call("core::negate", &[&x], &PadArgs::uniform(0, "nearest")).unwrap();
    assert_eq!(y.data().data(), &[-1.0, 2.0]);
}
