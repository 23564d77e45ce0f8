//! End-to-end tests for reading synthetic shapefiles.

use geo_format::Geometry;
use shapefile_reader::{
    read_shapefile, read_shapefile_with_encoding, AttributeValue, Encoding, ShapeType,
    ShapefileError,
};
use test_utils::coords::{ABRA_HOLE_CCW, ABRA_SQUARE_CW, CAGAYAN_SQUARE_CW};
use test_utils::{DbfBuilder, ShpBuilder};

fn name_dbf(names: &[&str]) -> DbfBuilder {
    names
        .iter()
        .fold(DbfBuilder::new().character("NAME", 20), |b, n| b.record(&[n]))
}

// ============================================================================
// Points
// ============================================================================

#[test]
fn test_read_points_with_attributes() {
    let shp = ShpBuilder::new(1)
        .point(121.9, 17.1)
        .point(122.0, 17.2)
        .build();
    let dbf = DbfBuilder::new()
        .numeric("pointid", 6, 0)
        .numeric("grid_code", 4, 0)
        .record(&["1", "3"])
        .record(&["2", "5"])
        .build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(shapefile.shape_type, ShapeType::Point);
    assert_eq!(shapefile.fields.len(), 2);
    assert_eq!(shapefile.features.len(), 2);

    let second = &shapefile.features[1];
    assert_eq!(second.geometry, Some(Geometry::point(122.0, 17.2)));
    assert_eq!(second.attribute("pointid"), Some(&AttributeValue::Integer(2)));
    assert_eq!(second.attribute("grid_code"), Some(&AttributeValue::Integer(5)));
}

#[test]
fn test_read_point_z_drops_elevation() {
    let shp = ShpBuilder::new(11).point_z(120.0, 15.0, 300.0, 0.0).build();
    let dbf = name_dbf(&["summit"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(
        shapefile.features[0].geometry,
        Some(Geometry::point(120.0, 15.0))
    );
}

#[test]
fn test_read_null_shape() {
    let shp = ShpBuilder::new(1).null().point(1.0, 2.0).build();
    let dbf = name_dbf(&["missing", "present"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(shapefile.features[0].geometry, None);
    assert!(shapefile.features[1].geometry.is_some());
}

#[test]
fn test_read_multipoint() {
    let shp = ShpBuilder::new(8)
        .multipoint(&[[1.0, 1.0], [2.0, 2.0], [3.0, 1.0]])
        .build();
    let dbf = name_dbf(&["cluster"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    match &shapefile.features[0].geometry {
        Some(Geometry::MultiPoint { coordinates }) => assert_eq!(coordinates.len(), 3),
        other => panic!("expected multipoint, got {:?}", other),
    }
}

// ============================================================================
// Lines
// ============================================================================

#[test]
fn test_read_single_part_polyline_as_linestring() {
    let shp = ShpBuilder::new(3)
        .polyline(vec![vec![[120.0, 16.0], [120.1, 16.1], [120.2, 16.3]]])
        .build();
    let dbf = DbfBuilder::new()
        .numeric("osm_id", 10, 0)
        .record(&["4815162342"])
        .build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    let feature = &shapefile.features[0];
    assert_eq!(
        feature.geometry,
        Some(Geometry::line_string(vec![
            [120.0, 16.0],
            [120.1, 16.1],
            [120.2, 16.3]
        ]))
    );
    assert_eq!(
        feature.attribute("osm_id"),
        Some(&AttributeValue::Integer(4815162342))
    );
}

#[test]
fn test_read_multi_part_polyline() {
    let shp = ShpBuilder::new(3)
        .polyline(vec![
            vec![[0.0, 0.0], [1.0, 1.0]],
            vec![[2.0, 2.0], [3.0, 3.0], [4.0, 4.0]],
        ])
        .build();
    let dbf = name_dbf(&["split road"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    match &shapefile.features[0].geometry {
        Some(Geometry::MultiLineString { coordinates }) => {
            assert_eq!(coordinates.len(), 2);
            assert_eq!(coordinates[1].len(), 3);
        }
        other => panic!("expected multilinestring, got {:?}", other),
    }
}

// ============================================================================
// Polygons
// ============================================================================

#[test]
fn test_read_polygon_with_hole() {
    let shp = ShpBuilder::new(5)
        .polygon(vec![ABRA_SQUARE_CW.to_vec(), ABRA_HOLE_CCW.to_vec()])
        .build();
    let dbf = name_dbf(&["Abra River Basin"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    match &shapefile.features[0].geometry {
        Some(Geometry::Polygon { coordinates }) => {
            assert_eq!(coordinates.len(), 2);
            assert_eq!(coordinates[0], ABRA_SQUARE_CW.to_vec());
            assert_eq!(coordinates[1], ABRA_HOLE_CCW.to_vec());
        }
        other => panic!("expected polygon, got {:?}", other),
    }
}

#[test]
fn test_read_two_exteriors_as_multipolygon() {
    let shp = ShpBuilder::new(5)
        .polygon(vec![
            ABRA_SQUARE_CW.to_vec(),
            CAGAYAN_SQUARE_CW.to_vec(),
            ABRA_HOLE_CCW.to_vec(),
        ])
        .build();
    let dbf = name_dbf(&["Northern Luzon"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    match &shapefile.features[0].geometry {
        Some(Geometry::MultiPolygon { coordinates }) => {
            assert_eq!(coordinates.len(), 2);
            // The hole lies inside the Abra square
            assert_eq!(coordinates[0].len(), 2);
            assert_eq!(coordinates[1].len(), 1);
        }
        other => panic!("expected multipolygon, got {:?}", other),
    }
}

#[test]
fn test_read_polygon_z() {
    let shp = ShpBuilder::new(15)
        .polygon_z(vec![ABRA_SQUARE_CW.to_vec()])
        .polygon_z(vec![CAGAYAN_SQUARE_CW.to_vec()])
        .build();
    let dbf = name_dbf(&["a", "b"]).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(shapefile.shape_type, ShapeType::Polygon);
    assert_eq!(shapefile.features.len(), 2);
    assert!(matches!(
        shapefile.features[1].geometry,
        Some(Geometry::Polygon { .. })
    ));
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn test_mixed_attribute_types_keep_field_order() {
    let shp = ShpBuilder::new(1).point(0.0, 0.0).build();
    let dbf = DbfBuilder::new()
        .character("name", 16)
        .numeric("area", 10, 3)
        .logical("protected")
        .date("surveyed")
        .integer("pop")
        .record(&["Mt. Pulag", "80.5", "T", "20230704", "1200"])
        .build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    let feature = &shapefile.features[0];
    let names: Vec<&str> = feature.attributes.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["name", "area", "protected", "surveyed", "pop"]);

    let properties = feature.to_feature().properties;
    assert_eq!(properties["name"], "Mt. Pulag");
    assert_eq!(properties["area"], 80.5);
    assert_eq!(properties["protected"], true);
    assert_eq!(properties["surveyed"], "2023-07-04");
    assert_eq!(properties["pop"], 1200);
}

#[test]
fn test_deleted_records_are_skipped() {
    let shp = ShpBuilder::new(1)
        .point(1.0, 1.0)
        .point(2.0, 2.0)
        .point(3.0, 3.0)
        .build();
    let dbf = DbfBuilder::new()
        .character("NAME", 8)
        .record(&["keep1"])
        .deleted_record(&["gone"])
        .record(&["keep2"])
        .build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(shapefile.features.len(), 2);
    assert_eq!(
        shapefile.features[1].geometry,
        Some(Geometry::point(3.0, 3.0))
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_record_count_mismatch() {
    let shp = ShpBuilder::new(1).point(1.0, 1.0).point(2.0, 2.0).build();
    let dbf = name_dbf(&["only one"]).build();

    assert_eq!(
        read_shapefile(&shp, &dbf).unwrap_err(),
        ShapefileError::RecordCountMismatch {
            shapes: 2,
            records: 1
        }
    );
}

#[test]
fn test_truncated_shp() {
    let shp = ShpBuilder::new(5)
        .polygon(vec![ABRA_SQUARE_CW.to_vec()])
        .build();
    let truncated = &shp[..shp.len() - 10];
    let dbf = name_dbf(&["cut"]).build();

    assert!(matches!(
        read_shapefile(truncated, &dbf),
        Err(ShapefileError::Truncated { file: "shp", .. })
    ));
}

#[test]
fn test_dbf_passed_as_shp() {
    let dbf = name_dbf(&["x"]).build();
    assert!(matches!(
        read_shapefile(&dbf, &dbf),
        Err(ShapefileError::InvalidShp(_))
    ));
}

#[test]
fn test_empty_shapefile() {
    let shp = ShpBuilder::new(1).build();
    let dbf = DbfBuilder::new().character("NAME", 8).build();

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert!(shapefile.features.is_empty());
    assert_eq!(shapefile.fields.len(), 1);
}

// ============================================================================
// Attribute text and hostile headers
// ============================================================================

#[test]
fn test_windows_1252_text() {
    let shp = ShpBuilder::new(1).point(121.0, 14.48).build();
    let mut dbf = name_dbf(&["ParaXaque"]).build().to_vec();
    let at = dbf.iter().position(|&b| b == b'X').unwrap();
    dbf[at] = 0xF1;

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(
        shapefile.features[0].attribute("NAME"),
        Some(&AttributeValue::Text("Parañaque".into()))
    );
}

#[test]
fn test_utf8_text_with_declared_encoding() {
    let shp = ShpBuilder::new(1).point(121.0, 14.48).build();
    let dbf = name_dbf(&["Parañaque"]).build();
    let utf8 = Encoding::for_label(b"UTF-8").unwrap();

    let shapefile = read_shapefile_with_encoding(&shp, &dbf, utf8).unwrap();
    assert_eq!(
        shapefile.features[0].attribute("NAME"),
        Some(&AttributeValue::Text("Parañaque".into()))
    );
}

#[test]
fn test_inflated_dbf_record_count() {
    let shp = ShpBuilder::new(1).point(120.6, 17.6).build();
    let mut dbf = name_dbf(&["Bangued"]).build().to_vec();
    dbf[4..8].copy_from_slice(&u32::MAX.to_le_bytes());

    let shapefile = read_shapefile(&shp, &dbf).unwrap();
    assert_eq!(shapefile.features.len(), 1);
    assert_eq!(
        shapefile.features[0].attribute("NAME"),
        Some(&AttributeValue::Text("Bangued".into()))
    );
}
