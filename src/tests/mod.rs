mod ring_tests;
