use super::equimolar_flash;
use approx::assert_relative_eq;
use btx_flash::*;
use quantity::*;

fn assert_valid_outlets(flash: &FlashUnit) -> FlashResult<()> {
    for outlet in [flash.vap_outlet()?, flash.liq_outlet()?] {
        assert!(outlet.molefracs.iter().all(|&x| (0.0..=1.0).contains(&x)));
        assert_relative_eq!(outlet.molefracs.sum(), 1.0, epsilon = 1e-8);
    }
    let beta = flash.vapor_fraction()?;
    assert!((0.0..=1.0).contains(&beta));
    Ok(())
}

#[test]
fn test_degrees_of_freedom() -> FlashResult<()> {
    let flash = FlashUnit::new(PropertyPackage::btx());
    assert_eq!(flash.degrees_of_freedom(), 15);
    let flash = equimolar_flash(368.0)?;
    assert_eq!(flash.degrees_of_freedom(), 0);
    Ok(())
}

#[test]
fn test_solve_requires_zero_degrees_of_freedom() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.heat_duty.unfix();
    assert_eq!(flash.degrees_of_freedom(), 1);
    assert!(matches!(
        flash.solve(SolverOptions::default()),
        Err(FlashError::DegreesOfFreedom { .. })
    ));
    Ok(())
}

#[test]
fn test_adiabatic_flash() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.initialize(SolverOptions::default())?;
    let status = flash.solve(SolverOptions::default())?;
    assert!(status.is_converged());
    assert_valid_outlets(&flash)?;
    assert_eq!(
        flash.phase_regimes()?,
        [PhaseRegime::TwoPhase, PhaseRegime::TwoPhase]
    );

    // without heat duty and pressure drop the outlet equals the inlet state
    let (vapor, liquid) = (flash.vap_outlet()?, flash.liq_outlet()?);
    assert_relative_eq!(vapor.temperature, 368.0 * KELVIN, max_relative = 1e-8);
    assert_relative_eq!(vapor.pressure, 101325.0 * PASCAL, max_relative = 1e-12);
    assert_relative_eq!(liquid.molefracs[0], 0.41, epsilon = 0.01);
    assert_relative_eq!(vapor.molefracs[0], 0.63, epsilon = 0.01);

    // component balance
    let beta = flash.vapor_fraction()?;
    for i in 0..2 {
        assert_relative_eq!(
            (1.0 - beta) * liquid.molefracs[i] + beta * vapor.molefracs[i],
            0.5,
            epsilon = 1e-8
        );
    }
    assert_relative_eq!(
        vapor.flow + liquid.flow,
        1.0 * MOL,
        max_relative = 1e-12
    );
    Ok(())
}

#[test]
fn test_solve_without_initialization() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    let status = flash.solve(SolverOptions::default())?;
    assert!(status.is_converged());
    assert_valid_outlets(&flash)?;
    Ok(())
}

#[test]
fn test_heat_duty() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.solve(SolverOptions::default())?;
    let beta_adiabatic = flash.vapor_fraction()?;

    flash.fix_heat_duty(2000.0 * JOULE);
    flash.solve(SolverOptions::default())?;
    assert_valid_outlets(&flash)?;
    assert!(flash.vapor_fraction()? > beta_adiabatic);
    assert!(flash.vap_outlet()?.temperature > 368.0 * KELVIN);
    Ok(())
}

#[test]
fn test_pressure_drop() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.solve(SolverOptions::default())?;
    let beta_adiabatic = flash.vapor_fraction()?;

    flash.fix_deltap(-10000.0 * PASCAL);
    flash.solve(SolverOptions::default())?;
    assert_valid_outlets(&flash)?;

    let vapor = flash.vap_outlet()?;
    assert_relative_eq!(vapor.pressure, 91325.0 * PASCAL, max_relative = 1e-12);
    // adiabatic expansion cools the mixture and evaporates part of it
    assert!(vapor.temperature < 368.0 * KELVIN);
    assert!(flash.vapor_fraction()? > beta_adiabatic);
    Ok(())
}

#[test]
fn test_subcooled_liquid() -> FlashResult<()> {
    let mut flash = equimolar_flash(330.0)?;
    let status = flash.solve(SolverOptions::default())?;
    assert!(status.is_converged());
    assert_eq!(
        flash.phase_regimes()?,
        [PhaseRegime::Liquid, PhaseRegime::Liquid]
    );
    assert_valid_outlets(&flash)?;
    assert_relative_eq!(flash.vapor_fraction()?, 0.0, epsilon = 1e-12);
    assert_relative_eq!(
        flash.liq_outlet()?.temperature,
        330.0 * KELVIN,
        max_relative = 1e-8
    );
    assert_relative_eq!(flash.liq_outlet()?.molefracs[0], 0.5, epsilon = 1e-8);
    Ok(())
}

#[test]
fn test_superheated_vapor() -> FlashResult<()> {
    let mut flash = equimolar_flash(400.0)?;
    flash.solve(SolverOptions::default())?;
    assert_eq!(
        flash.phase_regimes()?,
        [PhaseRegime::Vapor, PhaseRegime::Vapor]
    );
    assert_valid_outlets(&flash)?;
    assert_relative_eq!(flash.vapor_fraction()?, 1.0, epsilon = 1e-12);
    assert_relative_eq!(flash.vap_outlet()?.molefracs[0], 0.5, epsilon = 1e-8);
    Ok(())
}

#[test]
fn test_invalid_inlet() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.mole_frac_comp_mut("benzene")?.fix(0.7);
    assert!(matches!(
        flash.solve(SolverOptions::default()),
        Err(FlashError::InvalidState(..))
    ));
    Ok(())
}

#[test]
fn test_report() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    assert!(flash.to_string().contains("Vapor Outlet"));
    flash.solve(SolverOptions::default())?;
    let report = flash.to_string();
    assert!(report.contains("Heat Duty"));
    assert!(report.contains("Liquid Outlet"));
    Ok(())
}
