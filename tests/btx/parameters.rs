use approx::assert_relative_eq;
use btx_flash::*;

const PURE: &str = "parameters/btx_pure.json";
const BINARY: &str = "parameters/btx_binary.json";

#[test]
fn test_property_package_from_json() -> FlashResult<()> {
    let json = PropertyPackage::from_json(
        &["benzene", "toluene"],
        PURE,
        Some(BINARY),
        IdentifierOption::Name,
    )?;
    let btx = PropertyPackage::btx();
    assert_eq!(json.component_names(), btx.component_names());

    let (alpha, tau) = json.nrtl.values();
    let (alpha_ref, tau_ref) = btx.nrtl.values();
    assert_relative_eq!(alpha, alpha_ref);
    assert_relative_eq!(tau, tau_ref);

    let (t, p) = (368.0, 101325.0);
    let x = [0.4, 0.6];
    // row-major parameter matrices
    let (alpha, tau) = (alpha.transpose(), tau.transpose());
    let (a, tau) = (alpha.as_slice(), tau.as_slice());
    for (k, k_ref) in json
        .k_values(t, p, &x, a, tau)
        .iter()
        .zip(btx.k_values(t, p, &x, a, tau))
    {
        assert_relative_eq!(*k, k_ref, max_relative = 1e-14);
    }
    Ok(())
}

#[test]
fn test_component_order() -> FlashResult<()> {
    let properties = PropertyPackage::from_json(
        &["108-88-3", "71-43-2"],
        PURE,
        Some(BINARY),
        IdentifierOption::Cas,
    )?;
    assert_eq!(properties.component_names(), ["toluene", "benzene"]);
    assert_relative_eq!(properties.tau("benzene", "toluene")?.value(), 0.169);
    assert_relative_eq!(properties.tau("toluene", "benzene")?.value(), -0.1559);
    Ok(())
}

#[test]
fn test_missing_component() {
    let properties = PropertyPackage::from_json(
        &["benzene", "xylene"],
        PURE,
        None,
        IdentifierOption::Name,
    );
    assert!(matches!(properties, Err(FlashError::ComponentsNotFound(_))));
}

#[test]
fn test_without_binary_records() -> FlashResult<()> {
    let properties =
        PropertyPackage::from_json(&["benzene", "toluene"], PURE, None, IdentifierOption::Name)?;
    let (alpha, tau) = properties.nrtl.values();
    assert!(alpha.iter().chain(tau.iter()).all(|&v| v == 0.0));
    Ok(())
}

#[test]
fn test_measurements_from_json() -> FlashResult<()> {
    let data = Measurement::from_json("parameters/vle_data.json")?;
    assert_eq!(data, Vec::from(VleData::new("benzene", 0.631425, 0.40906)));
    Ok(())
}
